//! Platform setters

use super::Op;
use crate::container::Platform;

const KNOWN_OS: &[&str] = &["linux", "windows", "freebsd", "darwin"];

pub fn os(os: &str) -> Op<Platform> {
    let os = os.to_string();
    Op::new("platform.os", move |p: &mut Platform| {
        if !KNOWN_OS.contains(&os.as_str()) {
            return Err(format!("unsupported operating system {:?}", os));
        }
        p.os = os.clone();
        Ok(())
    })
}

pub fn architecture(arch: &str) -> Op<Platform> {
    let arch = arch.to_string();
    Op::new("platform.architecture", move |p: &mut Platform| {
        if arch.is_empty() || arch.contains('/') {
            return Err(format!("invalid architecture {:?}", arch));
        }
        p.architecture = arch.clone();
        Ok(())
    })
}

pub fn variant(variant: &str) -> Op<Platform> {
    let variant = variant.to_string();
    Op::infallible("platform.variant", move |p: &mut Platform| p.variant = variant.clone())
}

pub fn os_version(version: &str) -> Op<Platform> {
    let version = version.to_string();
    Op::infallible("platform.os_version", move |p: &mut Platform| {
        p.os_version = version.clone()
    })
}

pub fn os_feature(feature: &str) -> Op<Platform> {
    let feature = feature.to_string();
    Op::infallible("platform.os_features", move |p: &mut Platform| {
        if !p.os_features.contains(&feature) {
            p.os_features.push(feature.clone());
        }
    })
}

/// Set OS, architecture and variant from `os/arch[/variant]`
pub fn parse(platform: &str) -> Op<Platform> {
    let parts: Vec<&str> = platform.split('/').collect();
    match parts.as_slice() {
        [os_name, arch] => Op::when(|| true, [os(os_name), architecture(arch)]),
        [os_name, arch, var] => Op::when(|| true, [os(os_name), architecture(arch), variant(var)]),
        _ => Op::failf("platform", format_args!("invalid platform {:?}", platform)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::apply;

    #[test]
    fn test_parse_platform() {
        let mut platform = Platform::default();
        let errors = apply(&mut platform, [parse("linux/arm64/v8")]);
        assert!(errors.is_empty());
        assert_eq!(platform.to_string(), "linux/arm64/v8");
    }

    #[test]
    fn test_invalid_platform() {
        let mut platform = Platform::default();
        let errors = apply(&mut platform, [parse("amd64"), parse("plan9/amd64")]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].field, "platform.os");
        assert_eq!(platform.architecture, "amd64");
    }
}
