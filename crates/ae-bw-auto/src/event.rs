//! Trigger event parsing and interface extraction.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use junos_script_common::xml;

use crate::error::{HandlerError, HandlerResult};

/// `... <Bandwidth ...> aeN index ...` as logged by the kernel on a LAG speed change.
static EVENT_INTERFACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bandwidth.*> (ae[0-9]+) index").expect("Invalid regex pattern"));

/// The event that started this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub message: String,
    pub facility: String,
}

impl TriggerEvent {
    pub fn new(message: impl Into<String>, facility: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            facility: facility.into(),
        }
    }

    /// Reads `trigger-event/message` and `trigger-event/facility` from the
    /// `<event-script-input>` document the event daemon writes to stdin.
    pub fn from_script_input(document: &str) -> HandlerResult<Self> {
        let scope = xml::element_contents(document, "trigger-event")
            .into_iter()
            .next()
            .unwrap_or_else(|| document.to_string());

        let message = xml::element_text(&scope, "message")
            .ok_or_else(|| HandlerError::event_parse("script input has no trigger-event message"))?;
        let facility = xml::element_text(&scope, "facility").unwrap_or_default();

        Ok(Self::new(message, facility))
    }

    /// The aggregate interface this event is about.
    pub fn interface_handle(&self) -> HandlerResult<InterfaceHandle> {
        extract_interface(&self.message)
    }
}

/// Name of the aggregate interface (`aeN`) the run operates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceHandle(String);

impl InterfaceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of logical unit `unit` of this interface, e.g. `ae3.0`.
    pub fn unit_name(&self, unit: u32) -> String {
        format!("{}.{}", self.0, unit)
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finds the `aeN` token in a bandwidth-change message.
pub fn extract_interface(message: &str) -> HandlerResult<InterfaceHandle> {
    EVENT_INTERFACE_RE
        .captures(message)
        .map(|caps| InterfaceHandle(caps[1].to_string()))
        .ok_or_else(|| HandlerError::event_parse(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_interface() {
        let handle =
            extract_interface("KERNEL EVENT <Bandwidth Something> ae3 index 7 <Up Broadcast>")
                .unwrap();
        assert_eq!(handle.as_str(), "ae3");
        assert_eq!(handle.to_string(), "ae3");
        assert_eq!(handle.unit_name(0), "ae3.0");
    }

    #[test]
    fn test_extract_multi_digit_interface() {
        let msg = "mib2d: EVENT <Bandwidth> ae127 index 650 <Up Broadcast Multicast> address #0";
        assert_eq!(extract_interface(msg).unwrap().as_str(), "ae127");
    }

    #[test]
    fn test_extract_rejects_other_shapes() {
        for msg in [
            "",
            "EVENT <Bandwidth> xe-0/0/0 index 7",
            "EVENT <UpDown> ae3 index 7",
            "EVENT <Bandwidth> ae3.0 index 7",
            "EVENT <Bandwidth> ae index 7",
            "Bandwidth ae3 index 7",
        ] {
            match extract_interface(msg) {
                Err(HandlerError::EventParse { message }) => assert_eq!(message, msg),
                other => panic!("{:?} should not parse, got {:?}", msg, other),
            }
        }
    }

    #[test]
    fn test_from_script_input() {
        let input = r#"<?xml version="1.0"?>
<event-script-input xmlns:junos="http://xml.juniper.net/junos/*/junos">
  <junos-context><hostname>re0-test</hostname></junos-context>
  <trigger-event>
    <id>SYSTEM</id>
    <type>syslog</type>
    <facility>kernel</facility>
    <severity>info</severity>
    <process><name>/kernel</name></process>
    <message>EVENT &lt;Bandwidth&gt; ae1 index 130 &lt;Up Broadcast Multicast&gt;</message>
  </trigger-event>
</event-script-input>"#;

        let event = TriggerEvent::from_script_input(input).unwrap();
        assert_eq!(event.facility, "kernel");
        assert_eq!(
            event.message,
            "EVENT <Bandwidth> ae1 index 130 <Up Broadcast Multicast>"
        );
        assert_eq!(event.interface_handle().unwrap().as_str(), "ae1");
    }

    #[test]
    fn test_from_script_input_without_message() {
        let input = "<event-script-input><trigger-event><facility>kernel</facility></trigger-event></event-script-input>";
        assert!(matches!(
            TriggerEvent::from_script_input(input),
            Err(HandlerError::EventParse { .. })
        ));
    }
}
