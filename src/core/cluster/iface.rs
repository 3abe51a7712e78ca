// src/core/cluster/iface.rs

//! Network interfaces reported by `GET_IFACES`. Loaded once at startup.

use crate::core::protocol::{IfaceEntry, IfaceListData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub link_up: bool,
    pub references: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceMap {
    pub ifaces: Vec<Interface>,
}

impl InterfaceMap {
    pub fn len(&self) -> usize {
        self.ifaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ifaces.is_empty()
    }

    pub fn snapshot(&self) -> IfaceListData {
        IfaceListData {
            ifaces: self
                .ifaces
                .iter()
                .map(|iface| IfaceEntry {
                    name: iface.name.clone(),
                    link_state: u16::from(iface.link_up),
                    references: iface.references,
                })
                .collect(),
        }
    }
}
