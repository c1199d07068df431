// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time support for resource tables.
//!
//! An image describes the resources of each slot in an `app.toml`. From an
//! image crate's `build.rs`:
//!
//! ```ignore
//! let cfg = build_resource_table::AppConfig::from_env_or("app.toml")?;
//! build_resource_table::generate(&cfg, &mut out)?;
//! ```
//!
//! and then `include!` the output to get a `RESOURCE_TABLE` for
//! `SystemRegistry::populate`.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};

use abi::{
    AppId, DeviceName, Priority, SysService, BOOT_PRIO_LEVELS, MAX_APPS,
    MAX_DEVICES_PER_APP, MAX_DEV_NAME_LEN,
};
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;

/// Environment variable that, when set, names the `app.toml` to use
/// instead of the image's own.
pub const APP_TOML_VAR: &str = "APPFW_APP_TOML";

/// An `app.toml` as written, before validation.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    name: String,
    #[serde(default)]
    apps: IndexMap<String, RawApp>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawApp {
    id: u8,
    priority: PrioritySpec,
    #[serde(default)]
    sys_service: Vec<SysServiceName>,
    #[serde(default)]
    devices: Vec<String>,
}

/// A priority either as a level within a boot band, or as a raw RTOS
/// priority.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PrioritySpec {
    Service { service: u8 },
    App { app: u8 },
    Raw(Priority),
}

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SysServiceName {
    Pmc,
    Host,
}

impl From<SysServiceName> for SysService {
    fn from(s: SysServiceName) -> Self {
        match s {
            SysServiceName::Pmc => SysService::PMC,
            SysServiceName::Host => SysService::HOST,
        }
    }
}

/// A validated `app.toml`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub name: String,
    /// Slots in the order the file lists them.
    pub apps: IndexMap<String, App>,
    /// File this was loaded from, if any.
    pub path: Option<PathBuf>,
}

/// Resources of one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct App {
    pub id: AppId,
    pub priority: Priority,
    pub sys_service: SysService,
    pub devices: Vec<DeviceName>,
}

impl AppConfig {
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text)?;
        Self::validate(raw)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut cfg = Self::parse(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        cfg.path = Some(path.to_owned());
        Ok(cfg)
    }

    /// Loads the file named by `APPFW_APP_TOML`, or `default` if that isn't
    /// set, and tells cargo to rebuild if either changes.
    pub fn from_env_or(default: impl AsRef<Path>) -> Result<Self> {
        println!("cargo:rerun-if-env-changed={}", APP_TOML_VAR);
        let path = match env::var_os(APP_TOML_VAR) {
            Some(p) => PathBuf::from(p),
            None => default.as_ref().to_owned(),
        };
        println!("cargo:rerun-if-changed={}", path.display());
        Self::from_file(&path)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        let mut owners: [Option<&str>; MAX_APPS] = [None; MAX_APPS];
        let mut apps = IndexMap::new();

        for (name, app) in &raw.apps {
            let Some(id) = AppId::new(app.id) else {
                bail!(
                    "app `{}`: id {} is out of range (must be below {})",
                    name,
                    app.id,
                    MAX_APPS
                );
            };
            if let Some(other) = owners[id.index()] {
                bail!(
                    "app `{}`: id {} is already used by `{}`",
                    name,
                    app.id,
                    other
                );
            }
            owners[id.index()] = Some(name.as_str());

            let priority = match app.priority {
                PrioritySpec::Service { service: n } => {
                    check_level(name, "service", n)?;
                    Priority::service(n)
                }
                PrioritySpec::App { app: n } => {
                    check_level(name, "app", n)?;
                    Priority::app(n)
                }
                PrioritySpec::Raw(p) => p,
            };

            if app.devices.len() > MAX_DEVICES_PER_APP {
                bail!(
                    "app `{}`: {} devices requested, at most {} allowed",
                    name,
                    app.devices.len(),
                    MAX_DEVICES_PER_APP
                );
            }
            let devices = app
                .devices
                .iter()
                .map(|d| {
                    DeviceName::try_from_str(d).map_err(|_| {
                        anyhow::anyhow!(
                            "app `{}`: device name `{}` is longer than {} bytes",
                            name,
                            d,
                            MAX_DEV_NAME_LEN - 1
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let sys_service = app
                .sys_service
                .iter()
                .fold(SysService::empty(), |acc, &s| acc | SysService::from(s));

            apps.insert(
                name.clone(),
                App {
                    id,
                    priority,
                    sys_service,
                    devices,
                },
            );
        }

        Ok(Self {
            name: raw.name,
            apps,
            path: None,
        })
    }

    /// The app occupying each slot.
    pub fn table(&self) -> [Option<(&str, &App)>; MAX_APPS] {
        let mut table = [None; MAX_APPS];
        for (name, app) in &self.apps {
            table[app.id.index()] = Some((name.as_str(), app));
        }
        table
    }
}

fn check_level(name: &str, band: &str, n: u8) -> Result<()> {
    if n >= BOOT_PRIO_LEVELS {
        bail!(
            "app `{}`: {} priority level {} is out of range (must be below {})",
            name,
            band,
            n,
            BOOT_PRIO_LEVELS
        );
    }
    Ok(())
}

/// Writes Rust source defining `RESOURCE_TABLE`, for an image crate to
/// `include!`.
pub fn generate(cfg: &AppConfig, out: &mut impl Write) -> Result<()> {
    writeln!(out, "// Resource table for image `{}`.", cfg.name)?;
    if let Some(path) = &cfg.path {
        writeln!(out, "// Generated from {}.", path.display())?;
    }
    writeln!(out)?;

    let table = cfg.table();
    for (name, app) in table.iter().flatten() {
        if app.devices.is_empty() {
            continue;
        }
        writeln!(
            out,
            "static DEVICES_{}: [::appfw::DeviceName; {}] = [ // {}",
            app.id.index(),
            app.devices.len(),
            name
        )?;
        for d in &app.devices {
            writeln!(out, "    ::appfw::DeviceName::from_str({:?}),", d.as_str())?;
        }
        writeln!(out, "];")?;
    }

    writeln!(out, "pub static RESOURCE_TABLE: ::appfw::ResourceTable = [")?;
    for (i, slot) in table.iter().enumerate() {
        let Some((name, app)) = slot else {
            writeln!(out, "    None, // {}", i)?;
            continue;
        };
        writeln!(out, "    // {}: {}", i, name)?;
        writeln!(
            out,
            "    Some(::appfw::ResourceEntry::new(::appfw::Priority({}))",
            app.priority.0
        )?;
        if !app.sys_service.is_empty() {
            writeln!(
                out,
                "        .with_sys_service(::appfw::SysService::from_bits_truncate({:#x}))",
                app.sys_service.bits()
            )?;
        }
        if !app.devices.is_empty() {
            writeln!(out, "        .with_devices(&DEVICES_{})", i)?;
        }
        writeln!(out, "    ),")?;
    }
    writeln!(out, "];")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "sample"

[apps.sys-service]
id = 0
priority = { service = 0 }
sys-service = ["pmc", "host"]

[apps.serv1]
id = 1
priority = { service = 1 }
devices = ["I2C_0", "GPIO_0", "PWM_0", "TGPIO_0"]

[apps.hello]
id = 3
priority = { app = 1 }
sys-service = ["host"]

[apps.odd]
id = 5
priority = -9
"#;

    fn generated(cfg: &AppConfig) -> String {
        let mut out = Vec::new();
        generate(cfg, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_sample() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.name, "sample");
        let names: Vec<_> = cfg.apps.keys().map(String::as_str).collect();
        assert_eq!(names, ["sys-service", "serv1", "hello", "odd"]);

        let sys = &cfg.apps["sys-service"];
        assert_eq!(sys.priority, Priority::service(0));
        assert_eq!(sys.sys_service, SysService::PMC | SysService::HOST);

        let serv1 = &cfg.apps["serv1"];
        assert_eq!(serv1.devices.len(), 4);
        assert_eq!(serv1.devices[3].as_str(), "TGPIO_0");

        assert_eq!(cfg.apps["hello"].priority, Priority::app(1));
        assert_eq!(cfg.apps["odd"].priority, Priority(-9));

        let table = cfg.table();
        assert!(table[2].is_none());
        assert_eq!(table[3].map(|(n, _)| n), Some("hello"));
    }

    #[test]
    fn generates_table() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        let text = generated(&cfg);

        assert!(text.contains(
            "pub static RESOURCE_TABLE: ::appfw::ResourceTable = ["
        ));
        assert!(text.contains("static DEVICES_1: [::appfw::DeviceName; 4]"));
        assert!(text.contains("::appfw::DeviceName::from_str(\"TGPIO_0\"),"));
        assert!(text.contains("::appfw::Priority(-15)"));
        assert!(text.contains("from_bits_truncate(0x3)"));
        assert!(text.contains("        .with_devices(&DEVICES_1)"));
        assert!(!text.contains("DEVICES_0"));
        assert_eq!(text.matches("    None,").count(), MAX_APPS - 4);
        assert_eq!(text.matches("    Some(").count(), 4);
    }

    #[test]
    fn rejects_bad_ids() {
        let e = AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 9\npriority = 0\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("app `a`: id 9 is out of range"));

        let e = AppConfig::parse(
            "name = \"x\"\n\
             [apps.a]\nid = 2\npriority = 0\n\
             [apps.b]\nid = 2\npriority = 1\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("already used by `a`"));
    }

    #[test]
    fn rejects_bad_levels_and_devices() {
        let e = AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = { service = 10 }\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("service priority level 10"));

        let e = AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = 0\n\
             devices = [\"A\", \"B\", \"C\", \"D\", \"E\"]\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("5 devices requested"));

        let e = AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = 0\n\
             devices = [\"A_DEVICE_NAME_THAT_IS_TOO_LONG\"]\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("longer than 19 bytes"));

        let e = AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = 0\n\
             devices = [\"TWENTY_CHARS_LONG_XX\"]\n",
        )
        .unwrap_err();
        assert!(e.to_string().contains("TWENTY_CHARS_LONG_XX"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = 0\nstack = 4\n",
        )
        .is_err());
        assert!(AppConfig::parse(
            "name = \"x\"\n[apps.a]\nid = 0\npriority = 0\n\
             sys-service = [\"gpu\"]\n",
        )
        .is_err());
    }
}
