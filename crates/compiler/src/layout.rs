//! Memory layout reports.
//!
//! A serializable snapshot of a compiled state vector's layout, for
//! integrators that generate bindings or binary readers from a config
//! (`sfc layout --json`). Offsets are relative to the start of the
//! vector's storage.

use serde::Serialize;
use surefire_core::StateVector;

#[derive(Debug, Serialize)]
pub struct ElementLayout {
    pub name: String,
    pub type_name: String,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct RegionLayout {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct LayoutReport {
    pub size_bytes: usize,
    pub regions: Vec<RegionLayout>,
    pub elements: Vec<ElementLayout>,
}

/// Build a layout report for a compiled state vector.
pub fn report(sv: &StateVector) -> LayoutReport {
    let base = sv
        .elements()
        .map(|(_, e)| e.addr() as usize)
        .chain(sv.regions().map(|(_, r)| r.addr() as usize))
        .min()
        .unwrap_or(0);

    let elements: Vec<ElementLayout> = sv
        .elements()
        .map(|(name, elem)| ElementLayout {
            name: name.to_string(),
            type_name: elem.ty().name().to_string(),
            offset: elem.addr() as usize - base,
            size: elem.size(),
        })
        .collect();

    let regions: Vec<RegionLayout> = sv
        .regions()
        .map(|(name, region)| RegionLayout {
            name: name.to_string(),
            offset: region.addr() as usize - base,
            size: region.size(),
        })
        .collect();

    let size_bytes = elements.iter().map(|e| e.offset + e.size).max().unwrap_or(0);

    LayoutReport {
        size_bytes,
        regions,
        elements,
    }
}

impl std::fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} bytes, {} elements, {} regions",
            self.size_bytes,
            self.elements.len(),
            self.regions.len()
        )?;
        for region in &self.regions {
            writeln!(
                f,
                "region {:<16} offset {:>4}  size {:>4}",
                region.name, region.offset, region.size
            )?;
        }
        for elem in &self.elements {
            writeln!(
                f,
                "{:<4} {:<16} offset {:>4}  size {:>4}",
                elem.type_name, elem.name, elem.offset, elem.size
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sv_assembly;

    #[test]
    fn test_report_offsets() {
        let sv = sv_assembly::compile_str(
            "[Foo]\nU64 time\nU8 mode\n[Bar]\nF32 ratio\n",
        )
        .unwrap();
        let report = report(&sv);

        assert_eq!(report.size_bytes, 13);
        assert_eq!(report.elements.len(), 3);
        assert_eq!(report.regions.len(), 2);

        assert_eq!(report.elements[0].offset, 0);
        assert_eq!(report.elements[1].offset, 8);
        assert_eq!(report.elements[2].offset, 9);
        assert_eq!(report.regions[1].offset, 9);
        assert_eq!(report.regions[1].size, 4);
        assert_eq!(report.elements[2].type_name, "F32");
    }

    #[test]
    fn test_report_serializes() {
        let sv = sv_assembly::compile_str("[Foo]\nI16 a\n").unwrap();
        let json = serde_json::to_string(&report(&sv)).unwrap();
        assert!(json.contains("\"type_name\":\"I16\""));
        assert!(json.contains("\"size_bytes\":2"));
    }
}
