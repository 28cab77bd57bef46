//! The state vector: a configured, immutable table of named elements and
//! regions over one shared byte store.

use std::collections::HashMap;

use tracing::debug;

use crate::element::{AnyElement, Element};
use crate::error::{Error, Result};
use crate::region::Region;
use crate::scalar::Scalar;

/// One named element entry in a state vector config.
#[derive(Debug, Clone)]
pub struct ElementConfig {
    pub name: String,
    pub element: AnyElement,
}

/// One named region entry in a state vector config.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    pub name: String,
    pub region: Region,
}

/// Input to [`StateVector::create`]. Elements and regions are given in
/// declared order; when regions are present, the element sequence must
/// exactly partition the region sequence.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub elements: Vec<ElementConfig>,
    pub regions: Vec<RegionConfig>,
}

/// A validated table of named elements and regions.
///
/// Built atomically: `create` either returns a fully validated vector or
/// an error, never a partial object. Contents stay mutable through the
/// element handles; the table itself is immutable.
#[derive(Debug)]
pub struct StateVector {
    elements: Vec<(String, AnyElement)>,
    regions: Vec<(String, Region)>,
    element_index: HashMap<String, usize>,
    region_index: HashMap<String, usize>,
}

impl StateVector {
    /// Validate a config and build the lookup tables.
    ///
    /// Checks, in order: at least one element (`Null`), unique element
    /// and region names (`SvElemDupe`, `SvRegionDupe`), and, when
    /// regions are configured, that walking the elements in declared
    /// order exactly covers each region in turn (`SvLayout`). A config
    /// with no regions waives the layout invariant.
    pub fn create(config: Config) -> Result<StateVector> {
        if config.elements.is_empty() {
            return Err(Error::Null);
        }

        let mut element_index = HashMap::new();
        for (idx, entry) in config.elements.iter().enumerate() {
            if element_index.insert(entry.name.clone(), idx).is_some() {
                return Err(Error::SvElemDupe);
            }
        }

        let mut region_index = HashMap::new();
        for (idx, entry) in config.regions.iter().enumerate() {
            if region_index.insert(entry.name.clone(), idx).is_some() {
                return Err(Error::SvRegionDupe);
            }
        }

        if !config.regions.is_empty() {
            Self::check_layout(&config)?;
        }

        debug!(
            elements = config.elements.len(),
            regions = config.regions.len(),
            "state vector created"
        );

        Ok(StateVector {
            elements: config
                .elements
                .into_iter()
                .map(|e| (e.name, e.element))
                .collect(),
            regions: config
                .regions
                .into_iter()
                .map(|r| (r.name, r.region))
                .collect(),
            element_index,
            region_index,
        })
    }

    /// Verify that the element sequence partitions the region sequence:
    /// each element starts at the running cursor and each region ends
    /// exactly where its last element ends.
    fn check_layout(config: &Config) -> Result<()> {
        let mut elems = config.elements.iter();
        for entry in &config.regions {
            let mut cursor = entry.region.addr() as usize;
            let end = cursor + entry.region.size();
            while cursor < end {
                let elem = elems.next().ok_or(Error::SvLayout)?;
                if elem.element.addr() as usize != cursor {
                    return Err(Error::SvLayout);
                }
                cursor += elem.element.size();
            }
            if cursor != end {
                return Err(Error::SvLayout);
            }
        }
        // Leftover elements outside all regions also violate the layout.
        if elems.next().is_some() {
            return Err(Error::SvLayout);
        }
        Ok(())
    }

    /// Look up an element as a typed handle.
    pub fn get_element<T: Scalar>(&self, name: &str) -> Result<Element<T>> {
        self.get_any_element(name)?.typed::<T>()
    }

    /// Look up an element as a type-erased handle.
    pub fn get_any_element(&self, name: &str) -> Result<AnyElement> {
        let idx = self.element_index.get(name).ok_or(Error::KeyNotFound)?;
        Ok(self.elements[*idx].1.clone())
    }

    /// Look up a region. Fails with `Empty` if the vector was configured
    /// without regions.
    pub fn get_region(&self, name: &str) -> Result<Region> {
        if self.regions.is_empty() {
            return Err(Error::Empty);
        }
        let idx = self.region_index.get(name).ok_or(Error::KeyNotFound)?;
        Ok(self.regions[*idx].1.clone())
    }

    /// Elements in declared order.
    pub fn elements(&self) -> impl Iterator<Item = (&str, &AnyElement)> {
        self.elements.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Regions in declared order.
    pub fn regions(&self) -> impl Iterator<Item = (&str, &Region)> {
        self.regions.iter().map(|(n, r)| (n.as_str(), r))
    }
}
