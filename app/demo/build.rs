// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::env;
use std::fs::File;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let cfg = build_resource_table::AppConfig::from_env_or("app.toml")?;

    let out = PathBuf::from(env::var("OUT_DIR")?).join("resource_table.rs");
    let mut file = File::create(&out)?;
    build_resource_table::generate(&cfg, &mut file)?;

    Ok(())
}
