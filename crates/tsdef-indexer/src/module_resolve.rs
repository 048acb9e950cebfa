//! Maps an import specifier to the file it names, following the subset of
//! Node/TypeScript module resolution that matters for navigation.

use std::path::{Component, Path, PathBuf};

/// Extensions tried, in order, when a specifier omits one.
const EXTENSIONS: &[&str] = &[
    "ts", "tsx", "d.ts", "mts", "d.mts", "cts", "d.cts", "js", "jsx", "mjs", "cjs",
];

/// `package.json` fields that point at a package's entry point.
const ENTRY_FIELDS: &[&str] = &["types", "typings", "main"];

/// Resolve `specifier` as written in `from_file`.
pub fn resolve_module(from_file: &Path, specifier: &str) -> Option<PathBuf> {
    let dir = from_file.parent()?;
    if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." {
        return resolve_relative(&dir.join(specifier));
    }
    if Path::new(specifier).is_absolute() {
        return resolve_relative(Path::new(specifier));
    }
    resolve_package(dir, specifier)
}

fn resolve_relative(target: &Path) -> Option<PathBuf> {
    let target = normalize(target);
    resolve_file(&target).or_else(|| resolve_directory(&target))
}

fn resolve_file(target: &Path) -> Option<PathBuf> {
    if target.is_file() && has_source_extension(target) {
        return Some(target.to_path_buf());
    }

    // ESM-style imports name the emitted `.js` file.
    if let Some(ext) = target.extension().and_then(|e| e.to_str()) {
        let swapped = match ext {
            "js" => Some(["ts", "tsx"].as_slice()),
            "jsx" => Some(["tsx"].as_slice()),
            "mjs" => Some(["mts"].as_slice()),
            "cjs" => Some(["cts"].as_slice()),
            _ => None,
        };
        if let Some(candidates) = swapped {
            for candidate in candidates {
                let path = target.with_extension(candidate);
                if path.is_file() {
                    return Some(path);
                }
            }
        }
    }

    let name = target.file_name()?.to_str()?;
    EXTENSIONS
        .iter()
        .map(|ext| target.with_file_name(format!("{name}.{ext}")))
        .find(|p| p.is_file())
}

fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if let Some(entry) = package_entry(dir) {
        let target = normalize(&dir.join(entry));
        if let Some(found) = resolve_file(&target) {
            return Some(found);
        }
        if target != dir
            && let Some(found) = index_file(&target)
        {
            return Some(found);
        }
    }

    index_file(dir)
}

fn index_file(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }
    resolve_file(&dir.join("index"))
}

fn package_entry(dir: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&raw).ok()?;
    ENTRY_FIELDS
        .iter()
        .filter_map(|field| manifest.get(*field).and_then(|v| v.as_str()))
        .find(|entry| !entry.is_empty())
        .map(String::from)
}

/// Bare specifier: look in every `node_modules` above `dir`, including the
/// matching `@types` package.
fn resolve_package(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let (package, subpath) = split_package(specifier)?;
    let types_package = types_package_name(package);

    for ancestor in dir.ancestors() {
        let modules = ancestor.join("node_modules");
        if !modules.is_dir() {
            continue;
        }
        for name in [package, types_package.as_str()] {
            let root = modules.join(name);
            if !root.is_dir() {
                continue;
            }
            let found = match subpath {
                Some(sub) => resolve_relative(&root.join(sub)),
                None => resolve_directory(&root),
            };
            if found.is_some() {
                return found;
            }
        }
    }
    None
}

/// `@scope/pkg/sub/path` → (`@scope/pkg`, `Some("sub/path")`).
fn split_package(specifier: &str) -> Option<(&str, Option<&str>)> {
    if specifier.is_empty() {
        return None;
    }
    let boundary = if specifier.starts_with('@') {
        let first = specifier.find('/')?;
        specifier[first + 1..].find('/').map(|i| first + 1 + i)
    } else {
        specifier.find('/')
    };
    Some(match boundary {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    })
}

/// `@scope/pkg` → `@types/scope__pkg`, `pkg` → `@types/pkg`.
fn types_package_name(package: &str) -> String {
    match package.strip_prefix('@') {
        Some(scoped) => format!("@types/{}", scoped.replacen('/', "__", 1)),
        None => format!("@types/{package}"),
    }
}

fn has_source_extension(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    EXTENSIONS.iter().any(|ext| {
        name.strip_suffix(ext)
            .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
    })
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
