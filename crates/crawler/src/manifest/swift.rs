//! `Package.swift` interpreter
//!
//! [`SwiftManifestInterpreter`] reads the constrained subset of Swift that
//! package manifests use in practice. It does not execute the manifest.
//!
//! # Steps
//!
//! 1. Read the `// swift-tools-version:X.Y[.Z]` header (first line). Without
//!    one, fall back to the file-name hint, then to the minimum.
//! 2. Reject versions above the newest supported one (`InvalidToolsVersion`);
//!    clamp versions below the minimum up to it.
//! 3. Strip comments, respecting string literals, and check that brackets
//!    balance.
//! 4. Require a `Package(` declaration and collect the `url:` argument of
//!    every `.package(...)` call.
//!
//! ```swift
//! // swift-tools-version:5.0
//! import PackageDescription
//!
//! let package = Package(
//!     name: "App",
//!     dependencies: [
//!         .package(url: "https://github.com/apple/swift-nio.git", from: "2.0.0"),
//!     ]
//! )
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::CrawlError;
use crate::manifest::ManifestInterpreter;

static TOOLS_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//\s*swift-tools-version\s*:\s*(\d+)(?:\.(\d+))?(?:\.(\d+))?")
        .unwrap_or_else(|_| panic!("invalid tools version regex"))
});
static PACKAGE_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bPackage\s*\(").unwrap_or_else(|_| panic!("invalid package regex"))
});
static LEGACY_DEPENDENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.Package\s*\(").unwrap_or_else(|_| panic!("invalid legacy regex"))
});
static DEPENDENCY_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.package\s*\(").unwrap_or_else(|_| panic!("invalid dependency regex"))
});
static URL_ARG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\burl\s*:\s*"([^"]*)""#).unwrap_or_else(|_| panic!("invalid url regex"))
});

/// Interpreter for Swift package manifests.
#[derive(Debug, Clone)]
pub struct SwiftManifestInterpreter {
    min_tools_version: semver::Version,
    max_tools_version: semver::Version,
}

impl SwiftManifestInterpreter {
    /// Creates an interpreter accepting manifests up to `max_tools_version`;
    /// older declarations are evaluated as `min_tools_version`.
    pub fn new(min_tools_version: semver::Version, max_tools_version: semver::Version) -> Self {
        Self {
            min_tools_version,
            max_tools_version,
        }
    }

    /// Tools version declared on the manifest's first line.
    ///
    /// # Errors
    ///
    /// `CrawlError::InvalidManifest` when the header is present but unreadable.
    pub fn declared_tools_version(source: &str) -> Result<Option<semver::Version>, CrawlError> {
        let first_line = source
            .trim_start_matches('\u{feff}')
            .lines()
            .next()
            .unwrap_or("")
            .trim();

        if !first_line.contains("swift-tools-version") {
            return Ok(None);
        }

        let caps = TOOLS_VERSION_RE.captures(first_line).ok_or_else(|| {
            CrawlError::InvalidManifest(format!("malformed tools version header: {first_line}"))
        })?;
        let component = |idx: usize| -> Result<u64, CrawlError> {
            caps.get(idx).map_or(Ok(0), |m| {
                m.as_str().parse().map_err(|_| {
                    CrawlError::InvalidManifest(format!("tools version out of range: {first_line}"))
                })
            })
        };

        Ok(Some(semver::Version::new(
            component(1)?,
            component(2)?,
            component(3)?,
        )))
    }

    /// Version the manifest is evaluated as.
    ///
    /// # Errors
    ///
    /// `CrawlError::InvalidToolsVersion` when newer than supported.
    pub fn effective_tools_version(
        &self,
        declared: Option<semver::Version>,
        format_hint: Option<&semver::Version>,
    ) -> Result<semver::Version, CrawlError> {
        let version = declared
            .or_else(|| format_hint.cloned())
            .unwrap_or_else(|| self.min_tools_version.clone());

        if version > self.max_tools_version {
            return Err(CrawlError::InvalidToolsVersion {
                declared: version.to_string(),
                supported: self.max_tools_version.to_string(),
            });
        }

        if version < self.min_tools_version {
            debug!(
                declared = %version,
                minimum = %self.min_tools_version,
                "clamping tools version"
            );
            return Ok(self.min_tools_version.clone());
        }

        Ok(version)
    }
}

impl ManifestInterpreter for SwiftManifestInterpreter {
    fn extract_dependencies(
        &self,
        content: &[u8],
        format_hint: Option<&semver::Version>,
    ) -> Result<Vec<String>, CrawlError> {
        let source = std::str::from_utf8(content)
            .map_err(|e| CrawlError::InvalidManifest(format!("manifest is not utf-8: {e}")))?;
        if source.trim().is_empty() {
            return Err(CrawlError::InvalidManifest("manifest is empty".to_owned()));
        }

        let declared = Self::declared_tools_version(source)?;
        let version = self.effective_tools_version(declared, format_hint)?;

        let code = strip_comments(source)?;
        check_balanced(&code)?;

        if !PACKAGE_DECL_RE.is_match(&code) {
            return Err(CrawlError::InvalidManifest(
                "no Package declaration found".to_owned(),
            ));
        }

        // PackageDescription 4+ has no `.Package(url:majorVersion:)`
        if version.major >= 4 && LEGACY_DEPENDENCY_RE.is_match(&code) {
            return Err(CrawlError::InvalidManifest(format!(
                "legacy dependency syntax is not valid for tools version {version}"
            )));
        }

        let mut dependencies = Vec::new();
        for call in DEPENDENCY_CALL_RE.find_iter(&code) {
            let open = call.end() - 1;
            let close = matching_paren(code.as_bytes(), open)?;
            let arguments = &code[open + 1..close];
            if let Some(caps) = URL_ARG_RE.captures(arguments) {
                dependencies.push(caps[1].to_owned());
            }
        }

        Ok(dependencies)
    }
}

fn invalid(reason: &str) -> CrawlError {
    CrawlError::InvalidManifest(reason.to_owned())
}

/// Index one past the closing quote of the string literal opening at `start`.
fn string_end(bytes: &[u8], start: usize) -> Result<usize, CrawlError> {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i < bytes.len() {
            if bytes[i] == b'\\' {
                i += 2;
            } else if bytes[i..].starts_with(b"\"\"\"") {
                return Ok(i + 3);
            } else {
                i += 1;
            }
        }
        return Err(invalid("unterminated multi-line string literal"));
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Ok(i + 1),
            b'\n' => break,
            _ => i += 1,
        }
    }
    Err(invalid("unterminated string literal"))
}

/// Removes `//` and (nested) `/* */` comments, leaving string literals intact.
fn strip_comments(source: &str) -> Result<String, CrawlError> {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let end = string_end(bytes, i)?;
                out.extend_from_slice(&bytes[i..end]);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut depth = 1;
                i += 2;
                while depth > 0 {
                    if i >= bytes.len() {
                        return Err(invalid("unterminated block comment"));
                    }
                    if bytes[i..].starts_with(b"/*") {
                        depth += 1;
                        i += 2;
                    } else if bytes[i..].starts_with(b"*/") {
                        depth -= 1;
                        i += 2;
                    } else {
                        if bytes[i] == b'\n' {
                            out.push(b'\n');
                        }
                        i += 1;
                    }
                }
                out.push(b' ');
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| invalid("comment stripping broke utf-8"))
}

/// Verifies that `()`, `[]` and `{}` nest correctly outside string literals.
fn check_balanced(code: &str) -> Result<(), CrawlError> {
    let bytes = code.as_bytes();
    let mut stack = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i)?;
                continue;
            }
            open @ (b'(' | b'[' | b'{') => stack.push(open),
            close @ (b')' | b']' | b'}') => {
                let expected = match close {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if stack.pop() != Some(expected) {
                    return Err(CrawlError::InvalidManifest(format!(
                        "unbalanced '{}' at byte {i}",
                        close as char
                    )));
                }
            }
            _ => {}
        }
        i += 1;
    }

    if stack.is_empty() {
        Ok(())
    } else {
        Err(invalid("unclosed bracket at end of manifest"))
    }
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(bytes: &[u8], open: usize) -> Result<usize, CrawlError> {
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i)?;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(invalid("unclosed dependency declaration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> SwiftManifestInterpreter {
        SwiftManifestInterpreter::new(semver::Version::new(4, 0, 0), semver::Version::new(5, 10, 0))
    }

    const V5_MANIFEST: &str = r#"// swift-tools-version:5.0
import PackageDescription

let package = Package(
    name: "SwiftDependencyGraph",
    products: [
        .executable(name: "swift-dependency-graph", targets: ["swift-dependency-graph"]),
    ],
    dependencies: [
        .package(url: "https://github.com/swift-server/async-http-client", .upToNextMajor(from: "1.0.0")),
        // .package(url: "https://github.com/commented/out", from: "1.0.0"),
        .package(url: "https://github.com/kylef/Commander.git", .upToNextMajor(from: "0.9.1")),
        .package(path: "../Local"),
    ],
    targets: [
        .target(name: "swift-dependency-graph", dependencies: ["Commander"]),
    ]
)
"#;

    #[test]
    fn extracts_dependencies_from_v5_manifest() {
        let deps = interpreter()
            .extract_dependencies(V5_MANIFEST.as_bytes(), None)
            .unwrap();
        assert_eq!(
            deps,
            vec![
                "https://github.com/swift-server/async-http-client",
                "https://github.com/kylef/Commander.git",
            ]
        );
    }

    #[test]
    fn extracts_named_dependencies() {
        let manifest = r#"// swift-tools-version:5.2
import PackageDescription
let package = Package(
    name: "A",
    dependencies: [
        .package(name: "NIO", url: "https://github.com/apple/swift-nio", from: "2.0.0"),
    ]
)
"#;
        let deps = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap();
        assert_eq!(deps, vec!["https://github.com/apple/swift-nio"]);
    }

    #[test]
    fn block_comments_are_ignored() {
        let manifest = r#"// swift-tools-version:4.2
import PackageDescription
/* let unused = Package(name: "x", dependencies: [.package(url: "https://github.com/x/y", from: "1.0.0")]) */
let package = Package(name: "A", dependencies: [])
"#;
        let deps = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn newer_tools_version_is_rejected() {
        let manifest = "// swift-tools-version:6.0\nlet package = Package(name: \"A\")\n";
        let err = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidToolsVersion { .. }));
    }

    #[test]
    fn older_tools_version_is_clamped() {
        let interp = interpreter();
        let version = interp
            .effective_tools_version(Some(semver::Version::new(3, 1, 0)), None)
            .unwrap();
        assert_eq!(version, semver::Version::new(4, 0, 0));
    }

    #[test]
    fn hint_used_without_header() {
        let interp = interpreter();
        let hint = semver::Version::new(4, 2, 0);
        let version = interp.effective_tools_version(None, Some(&hint)).unwrap();
        assert_eq!(version, hint);
    }

    #[test]
    fn header_beats_hint() {
        let interp = interpreter();
        let hint = semver::Version::new(4, 0, 0);
        let version = interp
            .effective_tools_version(Some(semver::Version::new(5, 3, 0)), Some(&hint))
            .unwrap();
        assert_eq!(version, semver::Version::new(5, 3, 0));
    }

    #[test]
    fn declared_version_parses_spaced_header() {
        let version =
            SwiftManifestInterpreter::declared_tools_version("// swift-tools-version: 5.7.1\n")
                .unwrap();
        assert_eq!(version, Some(semver::Version::new(5, 7, 1)));
    }

    #[test]
    fn malformed_header_is_invalid_manifest() {
        let err = SwiftManifestInterpreter::declared_tools_version("// swift-tools-version:abc\n")
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidManifest(_)));
    }

    #[test]
    fn legacy_syntax_is_invalid_after_clamp() {
        let manifest = r#"import PackageDescription
let package = Package(
    name: "Old",
    dependencies: [
        .Package(url: "https://github.com/old/dep.git", majorVersion: 1),
    ]
)
"#;
        let err = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidManifest(_)));
    }

    #[test]
    fn unbalanced_manifest_is_invalid() {
        let manifest = "// swift-tools-version:5.0\nlet package = Package(name: \"A\", dependencies: [\n";
        let err = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidManifest(_)));
    }

    #[test]
    fn html_error_page_is_invalid() {
        let page = "<html><body>404: Not Found</body></html>";
        let err = interpreter()
            .extract_dependencies(page.as_bytes(), None)
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidManifest(_)));
    }

    #[test]
    fn non_utf8_is_invalid() {
        let err = interpreter()
            .extract_dependencies(&[0xff, 0xfe, 0x00], None)
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidManifest(_)));
    }

    #[test]
    fn parens_inside_strings_do_not_count() {
        let manifest = r#"// swift-tools-version:5.0
let package = Package(name: "weird (name", dependencies: [
    .package(url: "https://github.com/a/b)", from: "1.0.0"),
])
"#;
        let deps = interpreter()
            .extract_dependencies(manifest.as_bytes(), None)
            .unwrap();
        assert_eq!(deps, vec!["https://github.com/a/b)"]);
    }
}
