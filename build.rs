extern crate cbindgen;

use cbindgen::{Builder, Config};
use std::env;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let crate_env = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let crate_path = Path::new(&crate_env);
    let config = Config::from_root_or_default(crate_path);
    match Builder::new()
        .with_crate(crate_path)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            let include_dir = crate_path.join("include");
            if let Err(err) = std::fs::create_dir_all(&include_dir) {
                println!("cargo:warning=cannot create {}: {err}", include_dir.display());
                return;
            }
            bindings.write_to_file(include_dir.join("wgpu_native_shim.h"));
        }
        Err(err) => println!("cargo:warning=cannot generate header file: {err}"),
    }
}
