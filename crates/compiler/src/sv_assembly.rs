//! State vector assembly.
//!
//! Validates a state vector parse, allocates one zeroed backing buffer,
//! bump-assigns elements in declared order, and builds the regions that
//! span them. The runtime's `StateVector::create` re-checks the layout
//! invariant on the result.

use std::path::Path;

use tracing::debug;

use surefire_core::{
    AnyElement, ElementType, Error, Region, StateVector, new_store, state_vector,
};

use crate::diag::ConfigError;
use crate::sv_parse::{self, StateVectorParse};
use crate::token;

const ERR_CATEGORY: &str = "state vector config error";

/// Compile a state vector config from source text.
pub fn compile_str(source: &str) -> Result<StateVector, ConfigError> {
    let compile = || {
        let toks = token::tokenize(source)?;
        let parse = sv_parse::parse(&toks)?;
        compile_parse(&parse)
    };
    compile().map_err(|e| e.with_source(source))
}

/// Compile a state vector config file.
pub fn compile_file(path: &Path) -> Result<StateVector, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::global(
            Error::File,
            ERR_CATEGORY,
            format!("failed to open file `{}`: {}", path.display(), e),
        )
    })?;
    compile_str(&source).map_err(|e| e.with_file(path))
}

/// Compile a parsed state vector config.
pub fn compile_parse(parse: &StateVectorParse) -> Result<StateVector, ConfigError> {
    if parse.regions.is_empty() {
        return Err(ConfigError::global(
            Error::SvEmpty,
            ERR_CATEGORY,
            "config has no regions",
        ));
    }

    // Region names must be unique.
    for (idx, region) in parse.regions.iter().enumerate() {
        if let Some(prev) = parse.regions[..idx]
            .iter()
            .find(|r| r.plain_name == region.plain_name)
        {
            return Err(ConfigError::at(
                Error::SvRegionDupe,
                ERR_CATEGORY,
                format!(
                    "reuse of region name `{}` (previously used on line {})",
                    region.plain_name, prev.name.line
                ),
                &region.name,
            ));
        }
    }

    // Element names must be unique across the whole config.
    let elems: Vec<_> = parse.regions.iter().flat_map(|r| r.elems.iter()).collect();
    for (idx, elem) in elems.iter().enumerate() {
        if let Some(prev) = elems[..idx].iter().find(|e| e.name.text == elem.name.text) {
            return Err(ConfigError::at(
                Error::SvElemDupe,
                ERR_CATEGORY,
                format!(
                    "reuse of element name `{}` (previously used on line {})",
                    elem.name.text, prev.name.line
                ),
                &elem.name,
            ));
        }
    }

    // Resolve types and size the backing buffer.
    let mut total_bytes = 0;
    for region in &parse.regions {
        if region.elems.is_empty() {
            return Err(ConfigError::at(
                Error::SvRegionEmpty,
                ERR_CATEGORY,
                "region is empty",
                &region.name,
            ));
        }
        for elem in &region.elems {
            let ty = ElementType::from_name(&elem.ty.text).ok_or_else(|| {
                ConfigError::at(
                    Error::SvElemType,
                    ERR_CATEGORY,
                    format!("unknown type `{}`", elem.ty.text),
                    &elem.ty,
                )
            })?;
            total_bytes += ty.size_bytes();
        }
    }

    // Bump-assign elements into one zeroed buffer, regions spanning
    // exactly their elements.
    let store = new_store(total_bytes);
    let mut config = state_vector::Config::default();
    let mut offset = 0;
    for region in &parse.regions {
        let region_start = offset;
        for elem in &region.elems {
            // Types resolved above; a second failure here is impossible.
            let ty = ElementType::from_name(&elem.ty.text).ok_or_else(|| {
                ConfigError::global(Error::Unreachable, ERR_CATEGORY, "type resolution")
            })?;
            config.elements.push(state_vector::ElementConfig {
                name: elem.name.text.clone(),
                element: AnyElement::new(ty, store.clone(), offset),
            });
            offset += ty.size_bytes();
        }
        config.regions.push(state_vector::RegionConfig {
            name: region.plain_name.clone(),
            region: Region::new(store.clone(), region_start, offset - region_start),
        });
    }

    let sv = StateVector::create(config)
        .map_err(|e| ConfigError::global(e, ERR_CATEGORY, e.to_string()))?;

    debug!(
        regions = parse.regions.len(),
        elements = elems.len(),
        bytes = total_bytes,
        "state vector compiled"
    );

    Ok(sv)
}

/// Build a single-region state vector directly from name/type pairs.
/// Used for the state machine's local elements.
pub(crate) fn build_state_vector(
    region_name: &str,
    elems: &[(String, ElementType)],
) -> surefire_core::Result<StateVector> {
    let total_bytes: usize = elems.iter().map(|(_, ty)| ty.size_bytes()).sum();
    let store = new_store(total_bytes);

    let mut config = state_vector::Config::default();
    let mut offset = 0;
    for (name, ty) in elems {
        config.elements.push(state_vector::ElementConfig {
            name: name.clone(),
            element: AnyElement::new(*ty, store.clone(), offset),
        });
        offset += ty.size_bytes();
    }
    config.regions.push(state_vector::RegionConfig {
        name: region_name.to_string(),
        region: Region::new(store, 0, total_bytes),
    });

    StateVector::create(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_two_regions() {
        let sv = compile_str(
            "[Telemetry]\n\
             U64 time\n\
             F64 altitude\n\
             BOOL armed\n\
             \n\
             [Commands]\n\
             U8 mode\n",
        )
        .unwrap();

        assert_eq!(sv.get_region("Telemetry").unwrap().size(), 17);
        assert_eq!(sv.get_region("Commands").unwrap().size(), 1);

        let time = sv.get_element::<u64>("time").unwrap();
        time.write(123);
        assert_eq!(time.read(), 123);
        sv.get_element::<bool>("armed").unwrap().write(true);

        // Region bytes are the packed concatenation of the elements.
        let mut bytes = [0u8; 17];
        sv.get_region("Telemetry").unwrap().read(&mut bytes).unwrap();
        assert_eq!(u64::from_ne_bytes(bytes[..8].try_into().unwrap()), 123);
        assert_eq!(bytes[16], 1);
    }

    #[test]
    fn test_elements_are_zeroed() {
        let sv = compile_str("[Foo]\nI64 a\nF32 b\n").unwrap();
        assert_eq!(sv.get_element::<i64>("a").unwrap().read(), 0);
        assert_eq!(sv.get_element::<f32>("b").unwrap().read(), 0.0);
    }

    #[test]
    fn test_region_addresses_are_contiguous() {
        let sv = compile_str("[Foo]\nU16 a\nU16 b\n[Bar]\nU32 c\n").unwrap();
        let a = sv.get_any_element("a").unwrap();
        let b = sv.get_any_element("b").unwrap();
        let c = sv.get_any_element("c").unwrap();
        assert_eq!(a.addr() as usize + 2, b.addr() as usize);
        assert_eq!(b.addr() as usize + 2, c.addr() as usize);
        assert_eq!(sv.get_region("Foo").unwrap().addr(), a.addr());
        assert_eq!(sv.get_region("Bar").unwrap().addr(), c.addr());
    }

    #[test]
    fn test_empty_config() {
        let err = compile_str("\n").unwrap_err();
        assert_eq!(err.code(), Error::SvEmpty);
        assert_eq!(err.line(), -1);
    }

    #[test]
    fn test_duplicate_region_name() {
        let err = compile_str("[Foo]\nI8 a\n[Foo]\nI8 b\n").unwrap_err();
        assert_eq!(err.code(), Error::SvRegionDupe);
        assert_eq!((err.line(), err.col()), (3, 1));
    }

    #[test]
    fn test_duplicate_element_name_across_regions() {
        let err = compile_str("[Foo]\nI8 a\n[Bar]\nU8 a\n").unwrap_err();
        assert_eq!(err.code(), Error::SvElemDupe);
        assert_eq!((err.line(), err.col()), (4, 4));
    }

    #[test]
    fn test_empty_region() {
        let err = compile_str("[Foo]\n[Bar]\nI8 a\n").unwrap_err();
        assert_eq!(err.code(), Error::SvRegionEmpty);
        assert_eq!((err.line(), err.col()), (1, 1));
    }

    #[test]
    fn test_unknown_type() {
        let err = compile_str("[Foo]\nI33 a\n").unwrap_err();
        assert_eq!(err.code(), Error::SvElemType);
        assert_eq!((err.line(), err.col()), (2, 1));
    }

    #[test]
    fn test_build_state_vector_helper() {
        let sv = build_state_vector(
            "LOCAL",
            &[
                ("T".to_string(), ElementType::Uint64),
                ("foo".to_string(), ElementType::Int32),
            ],
        )
        .unwrap();
        assert_eq!(sv.get_region("LOCAL").unwrap().size(), 12);
        assert_eq!(sv.get_element::<u64>("T").unwrap().read(), 0);
    }
}
