#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

use anyhow::Result;
use vergen::EmitBuilder;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=static");

    EmitBuilder::builder()
        .all_build()
        .git_describe(true, true, None)
        .emit()?;

    return Ok(());
}
