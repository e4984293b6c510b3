//! Static security scanner.
//!
//! The scan is a set of best-effort heuristics, it favors reporting too much
//! over missing something:
//!
//! 1. Source and configuration files are matched against named regex
//!    patterns (hardcoded keys, database URLs with credentials, queries or
//!    shell commands built with `format!`...)
//! 2. The `.env` file is reviewed for required and optional variables
//! 3. Dependencies are audited with `cargo audit`
//! 4. Web server files are checked for security headers
//! 5. The bot entry point is checked for session expiry handling and cleanup
//!
//! The resulting [`SecurityReport`] is advisory: issues never make the check
//! fail.

use std::{
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
};

use futures::future::join_all;
use log::{debug, error, warn};
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::{
    checks::env_file::load_env_file,
    config::Security,
    utils::{display_path, line_of_offset, truncate_chars},
};

/// Directories never scanned, wherever they appear in the tree.
pub const EXCLUDED_DIRS: [&str; 4] = ["target", ".git", "temp", "auth"];

/// Extensions of scanned files.
const SCANNED_EXTENSIONS: [&str; 6] = ["rs", "toml", "yaml", "yml", "json", "env"];

/// Maximum number of characters of a match kept in a finding.
const EXCERPT_LENGTH: usize = 100;

/// Number of findings displayed per issue type.
const DISPLAYED_FINDINGS: usize = 5;

/// Files that legitimately contain pattern-like text.
const DOCUMENTATION_FILES: &[&str] = &[".env.example", "README.md", "checks/security.rs"];
const SCANNER_FILE: &[&str] = &["checks/security.rs"];

/// `(name, pattern, excluded paths)` of every scanned issue type.
const PATTERNS: [(&str, &str, &[&str]); 6] = [
    (
        "API_KEYS",
        r#"(?i)(api[_-]?key|apikey|key|token|password|secret).*?["']([a-zA-Z0-9_-]{20,})["']"#,
        DOCUMENTATION_FILES,
    ),
    (
        "SQL_INJECTION",
        r"(?:execute|query|query_row|prepare)\s*\(\s*&?format!\(",
        SCANNER_FILE,
    ),
    (
        "HARDCODED_CREDENTIALS",
        r#"(?i)(username|password|user|pass|pwd).*?["']([a-zA-Z0-9_-]{3,})["']"#,
        DOCUMENTATION_FILES,
    ),
    (
        "EXPOSED_DB_URL",
        r"(mongodb|postgres|mysql)://[a-zA-Z0-9_-]+:[a-zA-Z0-9_-]+@[a-zA-Z0-9_.-]+",
        DOCUMENTATION_FILES,
    ),
    (
        "COMMAND_INJECTION",
        r#"Command::new\(\s*&?format!\(|\.arg\(\s*"-c"\s*\)\s*\.arg\(\s*&?format!\("#,
        SCANNER_FILE,
    ),
    (
        "INSECURE_ENV_USAGE",
        r#"env::var\("[A-Z0-9_]+"\)[^;]*?\.unwrap_or(?:_else)?\([^;]*?"[a-zA-Z0-9_-]{10,}""#,
        SCANNER_FILE,
    ),
];

/// Variables reviewed in the `.env` file, with whether they are required.
const ENV_VARS: [(&str, bool); 8] = [
    ("OPENAI_API_KEY", false),
    ("SESSION_ID", true),
    ("DATABASE_URL", false),
    ("TENOR_API_KEY", false),
    ("WEATHER_API_KEY", false),
    ("NEWS_API_KEY", false),
    ("OMDB_API_KEY", false),
    ("SERPAPI_KEY", false),
];

/// Headers every web server file is expected to set.
const SECURITY_HEADERS: [&str; 4] = [
    "Content-Security-Policy",
    "X-Content-Type-Options",
    "X-Frame-Options",
    "X-XSS-Protection",
];

/// A pattern match in a scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub kind: &'static str,
    /// Path relative to the scanned root
    pub file: String,
    /// 1-based line of the start of the match
    pub line: usize,
    /// Matched text, truncated
    pub excerpt: String,
}

/// A compiled issue pattern.
struct IssuePattern {
    kind: &'static str,
    regex: Regex,
    exclude: &'static [&'static str],
}

/// Regex scanner over source and configuration files.
pub struct SecurityScanner {
    patterns: Vec<IssuePattern>,
}

impl SecurityScanner {
    /// Compiles the built-in patterns.
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = PATTERNS
            .iter()
            .map(|&(kind, pattern, exclude)| {
                Ok(IssuePattern {
                    kind,
                    regex: Regex::new(pattern)?,
                    exclude,
                })
            })
            .collect::<Result<Vec<IssuePattern>, regex::Error>>()?;

        Ok(SecurityScanner { patterns })
    }

    /// Issue types in reporting order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|pattern| pattern.kind).collect()
    }

    /// Scans the content of one file.
    ///
    /// `file` is the path relative to the scanned root, it is matched against
    /// the exclusion list of each pattern.
    pub fn scan_content(&self, file: &str, content: &str) -> Vec<Finding> {
        let file = file.replace('\\', "/");
        let mut findings = Vec::new();

        for pattern in &self.patterns {
            if pattern.exclude.iter().any(|excluded| file.contains(excluded)) {
                continue;
            }

            for found in pattern.regex.find_iter(content) {
                findings.push(Finding {
                    kind: pattern.kind,
                    file: file.clone(),
                    line: line_of_offset(content, found.start()),
                    excerpt: truncate_chars(found.as_str(), EXCERPT_LENGTH),
                });
            }
        }

        findings
    }

    /// Scans every eligible file under `root`.
    ///
    /// Files are read concurrently, unreadable files and directories are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if `root` itself cannot be read.
    pub async fn scan_tree(&self, root: &Path) -> io::Result<Vec<Finding>> {
        // Fail early if the root is not readable
        let _entries = tokio::fs::read_dir(root).await?;

        let files = collect_files(root).await;
        debug!("scanning {} files under {}", files.len(), root.display());

        let contents = join_all(files.iter().map(tokio::fs::read_to_string)).await;

        let mut findings = Vec::new();
        for (path, content) in files.iter().zip(contents) {
            match content {
                Ok(content) => {
                    findings.extend(self.scan_content(&display_path(root, path), &content))
                }
                Err(e) => error!("error scanning file {}: {}", path.display(), e),
            }
        }

        Ok(findings)
    }
}

/// Lists scanned files under `root`, in path order.
///
/// Directories reached again through a symlink are skipped.
async fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    let mut visited = HashSet::new();

    while let Some(dir) = pending.pop() {
        if let Ok(canonical) = tokio::fs::canonicalize(&dir).await {
            if !visited.insert(canonical) {
                debug!("{} already scanned, skipping", dir.display());
                continue;
            }
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("unable to read directory {}: {}", dir.display(), e);
                continue;
            }
        };

        let mut paths = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => paths.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    warn!("unable to read an entry of {}: {}", dir.display(), e);
                    break;
                }
            }
        }
        paths.sort();

        let mut subdirs = Vec::new();
        for path in paths {
            if is_excluded(&path) {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_dir() => subdirs.push(path),
                Ok(_) if is_scanned_file(&path) => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("unable to stat {}: {}", path.display(), e),
            }
        }
        pending.extend(subdirs.into_iter().rev());
    }

    files.sort();
    files
}

fn is_excluded(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn is_scanned_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    // `.env` has no extension for `Path`, only a file stem
    name.ends_with(".env")
        || path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| SCANNED_EXTENSIONS.contains(&extension))
}

/// Review of one `.env` variable.
#[derive(Debug, PartialEq, Eq)]
pub struct EnvVarStatus {
    pub name: &'static str,
    pub required: bool,
    pub configured: bool,
}

impl EnvVarStatus {
    fn is_issue(&self) -> bool {
        self.required && !self.configured
    }
}

/// Reviews the variables of a parsed `.env` file.
pub fn review_env(env: &HashMap<String, String>) -> Vec<EnvVarStatus> {
    ENV_VARS
        .iter()
        .map(|&(name, required)| EnvVarStatus {
            name,
            required,
            configured: env.get(name).is_some_and(|value| !value.trim().is_empty()),
        })
        .collect()
}

/// Outcome of the dependency audit.
#[derive(Debug, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The audit was not requested
    Skipped,
    /// Number of vulnerable dependencies, possibly 0
    Vulnerabilities(usize),
    /// The audit could not run or its output was not understood
    Failed,
}

#[derive(Deserialize)]
struct AuditOutput {
    vulnerabilities: AuditVulnerabilities,
}

#[derive(Deserialize)]
struct AuditVulnerabilities {
    count: usize,
}

/// Extracts the vulnerability count from `cargo audit --json` output.
pub fn parse_audit_output(output: &str) -> Option<usize> {
    serde_json::from_str::<AuditOutput>(output)
        .ok()
        .map(|output| output.vulnerabilities.count)
}

/// Runs `cargo audit --json` in `root`.
///
/// `cargo audit` exits with a failure status when it finds vulnerabilities,
/// so the status is ignored and only the output is trusted.
pub async fn run_audit(root: &Path) -> AuditOutcome {
    let output = match Command::new("cargo")
        .args(["audit", "--json"])
        .current_dir(root)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            warn!("unable to run cargo audit: {}", e);
            return AuditOutcome::Failed;
        }
    };

    match parse_audit_output(&String::from_utf8_lossy(&output.stdout)) {
        Some(count) => AuditOutcome::Vulnerabilities(count),
        None => {
            warn!(
                "unexpected cargo audit output: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            AuditOutcome::Failed
        }
    }
}

/// A security header missing from a web server file.
#[derive(Debug, PartialEq, Eq)]
pub struct HeaderGap {
    pub file: String,
    pub header: &'static str,
}

/// Checks each existing web server file for every security header.
pub async fn check_headers(root: &Path, files: &[String]) -> Vec<HeaderGap> {
    let mut gaps = Vec::new();

    for file in files {
        let Ok(content) = tokio::fs::read_to_string(root.join(file)).await else {
            debug!("web server file {} not found, skipping", file);
            continue;
        };
        let content = content.to_lowercase();

        for header in SECURITY_HEADERS {
            if !content.contains(&header.to_lowercase()) {
                gaps.push(HeaderGap {
                    file: file.clone(),
                    header,
                });
            }
        }
    }

    gaps
}

/// Session handling review of the bot entry point.
#[derive(Debug, PartialEq, Eq)]
pub struct SessionReview {
    /// Every session marker is present
    pub expiry_handled: bool,
    /// At least one cleanup marker is present
    pub cleanup_implemented: bool,
}

impl SessionReview {
    fn issues(&self) -> usize {
        usize::from(!self.expiry_handled) + usize::from(!self.cleanup_implemented)
    }
}

/// Reviews the main file, `None` if it does not exist.
pub async fn check_session(root: &Path, security: &Security) -> Option<SessionReview> {
    let content = tokio::fs::read_to_string(root.join(&security.main_file))
        .await
        .ok()?;

    Some(SessionReview {
        expiry_handled: security
            .session_markers
            .iter()
            .all(|marker| content.contains(marker.as_str())),
        cleanup_implemented: security
            .cleanup_markers
            .iter()
            .any(|marker| content.contains(marker.as_str())),
    })
}

/// Outcome of a security check.
#[derive(Debug)]
pub struct SecurityReport {
    /// Issue types in reporting order
    pub kinds: Vec<&'static str>,
    pub findings: Vec<Finding>,
    /// `None` if there is no `.env` file
    pub env: Option<Vec<EnvVarStatus>>,
    pub audit: AuditOutcome,
    pub header_gaps: Vec<HeaderGap>,
    /// `None` if the main file does not exist
    pub session: Option<SessionReview>,
}

impl SecurityReport {
    pub fn total_issues(&self) -> usize {
        let env_issues = self
            .env
            .iter()
            .flatten()
            .filter(|status| status.is_issue())
            .count();
        let audit_issues = match self.audit {
            AuditOutcome::Vulnerabilities(count) => count,
            _ => 0,
        };
        let session_issues = self.session.as_ref().map_or(0, SessionReview::issues);

        self.findings.len() + env_issues + audit_issues + self.header_gaps.len() + session_issues
    }

    /// Findings of one issue type.
    pub fn findings_of(&self, kind: &str) -> Vec<&Finding> {
        self.findings.iter().filter(|f| f.kind == kind).collect()
    }

    /// Recommendations matching the issue types found.
    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut recommendations = Vec::new();
        let has = |kind: &str| self.findings.iter().any(|f| f.kind == kind);

        if has("API_KEYS") {
            recommendations.push("Move all API keys to environment variables.");
            recommendations.push("Read keys with std::env::var instead of hardcoding them.");
        }
        if has("SQL_INJECTION") {
            recommendations.push("Use parameterized queries for all database operations.");
            recommendations.push("Validate user input before using it in database queries.");
        }
        if has("EXPOSED_DB_URL") {
            recommendations.push("Move database connection strings to environment variables.");
        }
        recommendations.push("Run \"cargo audit\" and update vulnerable dependencies.");
        recommendations
            .push("Implement proper error handling and logging throughout the application.");

        recommendations
    }

    /// Renders the report as plain text.
    pub fn render(&self) -> String {
        let mut lines = vec![
            "🔍 Goodchild Security Check".to_string(),
            "==========================".to_string(),
        ];

        lines.extend(self.render_env());
        lines.extend(self.render_audit());
        lines.extend(self.render_headers());
        lines.extend(self.render_session());

        lines.push("\n📊 Security Check Results".to_string());
        lines.push("========================".to_string());

        let total = self.total_issues();
        if total == 0 {
            lines.push("✅ No security issues found.".to_string());
            return lines.join("\n") + "\n";
        }
        lines.push(format!("❌ Found {} potential security issues.", total));

        for kind in &self.kinds {
            let findings = self.findings_of(kind);
            if findings.is_empty() {
                continue;
            }
            lines.push(format!("\n{} ({} issues):", kind, findings.len()));
            lines.extend(findings.iter().take(DISPLAYED_FINDINGS).map(|finding| {
                format!(
                    "  - {} (line {}): {}",
                    finding.file, finding.line, finding.excerpt
                )
            }));
            if findings.len() > DISPLAYED_FINDINGS {
                lines.push(format!(
                    "  ... and {} more issues of this type.",
                    findings.len() - DISPLAYED_FINDINGS
                ));
            }
        }

        lines.push("\n🛠️ Recommendations:".to_string());
        lines.extend(
            self.recommendations()
                .iter()
                .enumerate()
                .map(|(index, recommendation)| format!("  {}. {}", index + 1, recommendation)),
        );

        lines.join("\n") + "\n"
    }

    fn render_env(&self) -> Vec<String> {
        let mut lines = vec!["\n🔍 Checking .env file...".to_string()];
        let Some(env) = &self.env else {
            lines.push(
                "⚠️ No .env file found. Make sure to create one before deployment.".to_string(),
            );
            return lines;
        };

        lines.extend(env.iter().map(|status| match (status.required, status.configured) {
            (true, false) => format!(
                "❌ Required environment variable {} is missing or empty.",
                status.name
            ),
            (_, true) => format!("✅ {} is configured.", status.name),
            (false, false) => format!(
                "⚠️ Optional environment variable {} is not configured.",
                status.name
            ),
        }));
        lines
    }

    fn render_audit(&self) -> Vec<String> {
        let mut lines = vec!["\n🔍 Checking for dependency vulnerabilities...".to_string()];
        match self.audit {
            AuditOutcome::Skipped => lines.push("⚠️ Dependency audit skipped.".to_string()),
            AuditOutcome::Vulnerabilities(0) => {
                lines.push("✅ No dependency vulnerabilities found.".to_string())
            }
            AuditOutcome::Vulnerabilities(count) => {
                lines.push(format!("❌ Found {} vulnerabilities in dependencies.", count));
                lines.push("  Run \"cargo update\" to pick up patched versions.".to_string());
            }
            AuditOutcome::Failed => {
                lines.push("❌ Error checking dependency vulnerabilities.".to_string());
                lines.push(
                    "  Install cargo-audit and run \"cargo audit\" manually to check for vulnerabilities."
                        .to_string(),
                );
            }
        }
        lines
    }

    fn render_headers(&self) -> Vec<String> {
        let mut lines = vec!["\n🔍 Checking for security headers in web server code...".to_string()];
        if self.header_gaps.is_empty() {
            lines.push("✅ Security headers are properly configured.".to_string());
            return lines;
        }
        lines.extend(self.header_gaps.iter().map(|gap| {
            format!(
                "⚠️ Security header \"{}\" not found in {}.",
                gap.header, gap.file
            )
        }));
        lines.push(format!(
            "⚠️ {} security headers are missing in web server code.",
            self.header_gaps.len()
        ));
        lines
    }

    fn render_session(&self) -> Vec<String> {
        let mut lines = vec!["\n🔍 Checking session storage security...".to_string()];
        let Some(session) = &self.session else {
            lines.push("⚠️ Main file not found, session handling not checked.".to_string());
            return lines;
        };

        lines.push(if session.expiry_handled {
            "✅ Basic session expiration handling is implemented.".to_string()
        } else {
            "⚠️ Session handling might not properly handle expired or closed sessions.".to_string()
        });
        lines.push(if session.cleanup_implemented {
            "✅ Session cleanup appears to be implemented.".to_string()
        } else {
            "⚠️ Session cleanup mechanism might be missing.".to_string()
        });
        lines
    }
}

/// Runs every security check in `root`.
///
/// # Errors
///
/// Returns an error if the scanner cannot be built or `root` cannot be
/// read. Issues found are never errors.
pub async fn check_security(
    root: &Path,
    security: &Security,
    skip_audit: bool,
) -> anyhow::Result<SecurityReport> {
    let scanner = SecurityScanner::new()?;
    let findings = scanner.scan_tree(root).await?;

    let env = match load_env_file(&root.join(".env")).await {
        Ok(env) => env.map(|env| review_env(&env)),
        Err(e) => {
            error!("unable to read .env file: {}", e);
            None
        }
    };

    let audit = if skip_audit {
        AuditOutcome::Skipped
    } else {
        run_audit(root).await
    };

    let header_gaps = check_headers(root, &security.web_server_files).await;
    let session = check_session(root, security).await;

    Ok(SecurityReport {
        kinds: scanner.kinds(),
        findings,
        env,
        audit,
        header_gaps,
        session,
    })
}
