//! Instrumentation configuration
//!
//! The static table of what to trap and what to answer: per-object property
//! overrides, methods to wrap or replace, and the synthetic properties defined
//! at startup. Loadable from JSON; [`InstrumentationConfig::default_profile`]
//! ships the generic-environment table (a Windows Firefox profile matching
//! what hardened browsers present, with empty plugin/MIME-type lists and a
//! UTC timezone).

use crate::value::Value;
use anyhow::{Context, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// One property override inside a target sweep. `value: None` means "report
/// access but return the real value".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyOverride {
    pub prop: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// One instrumented object: optionally sweep every own property, with
/// overrides applied where listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Display name of the host object (`Navigator`, `Screen`, `Window`, ...)
    pub obj: String,
    /// Trap every own property of the object, not just the listed ones
    #[serde(default)]
    pub trap_all: bool,
    #[serde(default)]
    pub overrides: Vec<PropertyOverride>,
}

/// A method to wrap (observe) or replace (fixed return value).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSpec {
    pub obj: String,
    pub method: String,
    /// When present, the method reports and returns this value without
    /// delegating to the native implementation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_with: Option<Value>,
}

/// A property defined at startup that does not natively exist on the target,
/// so later trapping treats it uniformly with native ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticProperty {
    pub obj: String,
    pub prop: String,
    pub value: Value,
}

/// Complete bootstrap configuration for one page-load context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Correlation id scoping the outbound channel; generated when absent
    #[serde(default = "generate_correlation_id")]
    pub correlation_id: String,
    #[serde(default)]
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
    #[serde(default)]
    pub synthetics: Vec<SyntheticProperty>,
}

/// Random per-page-load correlation id, hex encoded.
pub fn generate_correlation_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl InstrumentationConfig {
    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse instrumentation config")
    }

    /// The built-in generic-environment profile.
    pub fn default_profile() -> Self {
        let s = |v: &str| Some(Value::from(v));
        let navigator_overrides = vec![
            ("appCodeName", s("Mozilla")),
            ("appName", s("Netscape")),
            ("appVersion", s("5.0 (Windows)")),
            ("doNotTrack", s("unspecified")),
            ("language", s("en-US")),
            ("mimeTypes", Some(Value::List(vec![]))),
            ("platform", s("Win32")),
            ("plugins", Some(Value::List(vec![]))),
            (
                "userAgent",
                s("Mozilla/5.0 (Windows NT 6.1; rv:24.0) Gecko/20100101 Firefox/24.0"),
            ),
            ("vendor", s("")),
        ];
        let screen_overrides = vec![
            ("availWidth", Some(Value::Int(1000))),
            ("availHeight", Some(Value::Int(700))),
            ("width", Some(Value::Int(1000))),
            ("height", Some(Value::Int(700))),
            ("colorDepth", Some(Value::Int(24))),
        ];
        let window_overrides = vec![
            ("innerWidth", Some(Value::Int(1000))),
            ("innerHeight", Some(Value::Int(700))),
        ];

        let spec = |obj: &str, trap_all: bool, entries: Vec<(&str, Option<Value>)>| TargetSpec {
            obj: obj.to_string(),
            trap_all,
            overrides: entries
                .into_iter()
                .map(|(prop, value)| PropertyOverride {
                    prop: prop.to_string(),
                    value,
                })
                .collect(),
        };

        Self {
            correlation_id: generate_correlation_id(),
            targets: vec![
                spec("Navigator", true, navigator_overrides),
                spec("Screen", true, screen_overrides),
                spec("Window", false, window_overrides),
            ],
            methods: vec![
                MethodSpec {
                    obj: "Date.prototype".to_string(),
                    method: "getTimezoneOffset".to_string(),
                    replace_with: Some(Value::Int(0)),
                },
                MethodSpec {
                    obj: "HTMLCanvasElement.prototype".to_string(),
                    method: "toDataURL".to_string(),
                    replace_with: None,
                },
            ],
            synthetics: vec![
                SyntheticProperty {
                    obj: "Navigator".to_string(),
                    prop: "buildID".to_string(),
                    value: Value::from("20000101000000"),
                },
                SyntheticProperty {
                    obj: "Navigator".to_string(),
                    prop: "oscpu".to_string(),
                    value: Value::from("Windows NT 6.1"),
                },
            ],
        }
    }

    /// The configured override for a (object, property) pair, if any.
    pub fn override_for(&self, obj: &str, prop: &str) -> Option<&Value> {
        self.targets
            .iter()
            .filter(|t| t.obj == obj)
            .flat_map(|t| t.overrides.iter())
            .find(|o| o.prop == prop)
            .and_then(|o| o.value.as_ref())
    }
}
