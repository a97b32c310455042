/// `"<name> <version>"`, e.g. `cachectld 0.1.0`.
pub fn version_string(name: &str) -> String {
    format!("{name} {}", env!("CARGO_PKG_VERSION"))
}

pub fn print_version(name: &str) {
    println!("{}", version_string(name));
}
