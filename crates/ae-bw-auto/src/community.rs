//! Link-bandwidth community definition and its configuration fragment.
//!
//! A run owns exactly one community, `<prefix><aeN>`, and always replaces
//! it whole so a speed change never leaves the old member behind.

use std::fmt;

use junos_script_common::xml;

use crate::context::AsNumber;
use crate::event::InterfaceHandle;
use crate::speed::BandwidthValue;

/// Extended-community keyword for link bandwidth.
pub const BANDWIDTH_KEYWORD: &str = "bandwidth";

/// The community this run creates or replaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommunityDescriptor {
    pub name: String,
    pub asn: AsNumber,
    pub value: BandwidthValue,
}

impl CommunityDescriptor {
    pub fn build(
        prefix: &str,
        handle: &InterfaceHandle,
        asn: &AsNumber,
        value: BandwidthValue,
    ) -> Self {
        Self {
            name: format!("{}{}", prefix, handle),
            asn: asn.clone(),
            value,
        }
    }

    /// The single member, `bandwidth:<asn>:<value>`.
    pub fn member(&self) -> String {
        format!("{}:{}:{}", BANDWIDTH_KEYWORD, self.asn, self.value)
    }

    pub fn to_fragment(&self) -> ConfigFragment {
        ConfigFragment {
            descriptor: self.clone(),
        }
    }
}

impl fmt::Display for CommunityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} members {}", self.name, self.member())
    }
}

/// `policy-options community` fragment flagged `replace="replace"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFragment {
    descriptor: CommunityDescriptor,
}

impl ConfigFragment {
    pub fn descriptor(&self) -> &CommunityDescriptor {
        &self.descriptor
    }

    pub fn community_name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn members(&self) -> Vec<String> {
        vec![self.descriptor.member()]
    }

    /// Always true: the object is replaced, never merged.
    pub fn is_replace(&self) -> bool {
        true
    }

    /// Junos XML configuration document for `<load-configuration>`.
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                "<configuration>\n",
                "    <policy-options>\n",
                "        <community replace=\"replace\">\n",
                "            <name>{}</name>\n",
                "            <members>{}</members>\n",
                "        </community>\n",
                "    </policy-options>\n",
                "</configuration>"
            ),
            xml::escape(&self.descriptor.name),
            xml::escape(&self.descriptor.member())
        )
    }
}

impl fmt::Display for ConfigFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}
