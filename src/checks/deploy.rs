//! Deployment readiness check.
//!
//! Verifies that the files needed to build and run the bot are present, then
//! reports, for each supported hosting platform, which platform files and
//! environment variables are missing.
//!
//! A variable counts as present if it is set in the process environment or
//! in the project `.env` file.

use std::{collections::HashMap, path::Path};

use log::warn;

use crate::checks::env_file::load_env_file;

/// Files without which the bot cannot be deployed anywhere.
pub const REQUIRED_FILES: [&str; 3] = ["Cargo.toml", "config.yaml", ".env"];

/// Requirements of one hosting platform.
#[derive(Debug)]
pub struct Platform {
    pub name: &'static str,
    pub files: &'static [&'static str],
    pub vars: &'static [&'static str],
    pub instructions: &'static [&'static str],
}

/// Supported hosting platforms, in display order.
pub const PLATFORMS: [Platform; 6] = [
    Platform {
        name: "Heroku",
        files: &["Procfile", "app.json"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Click the \"Deploy to Heroku\" button in the README.md",
            "Or run: heroku create && git push heroku main",
        ],
    },
    Platform {
        name: "Railway",
        files: &["Cargo.toml"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Connect your GitHub repository",
            "Or run: railway up",
        ],
    },
    Platform {
        name: "Render",
        files: &["Cargo.toml"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Create a new Web Service using your GitHub repository",
            "Set build command: cargo build --release",
            "Set start command: ./target/release/goodchild shell",
        ],
    },
    Platform {
        name: "Koyeb",
        files: &["Dockerfile", "Cargo.toml"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Create a new App from your GitHub repository",
            "Set the start command to: goodchild shell",
        ],
    },
    Platform {
        name: "BotHosting.net",
        files: &["Cargo.toml"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Upload your release binary and configuration to BotHosting.net",
            "Set the start command to: ./goodchild shell",
        ],
    },
    Platform {
        name: "GitHub Actions",
        files: &["deploy.yml", ".github/workflows/deploy.yml"],
        vars: &["SESSION_ID"],
        instructions: &[
            "Ensure .github/workflows/deploy.yml exists",
            "Push to your repository to trigger the workflow",
        ],
    },
];

/// Missing requirements of one platform.
#[derive(Debug, PartialEq, Eq)]
pub struct PlatformReport {
    pub name: &'static str,
    pub missing_files: Vec<&'static str>,
    pub missing_vars: Vec<&'static str>,
}

/// Outcome of a deployment check.
#[derive(Debug)]
pub struct DeployReport {
    /// Required files that do not exist. When not empty, platforms are not
    /// checked.
    pub missing_required: Vec<&'static str>,
    /// Error reading the `.env` file, the check goes on without it.
    pub env_error: Option<String>,
    pub platforms: Vec<PlatformReport>,
}

impl DeployReport {
    /// Process exit code: 1 if a required file is missing, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.missing_required.is_empty() { 0 } else { 1 }
    }

    /// Renders the report as plain text.
    pub fn render(&self) -> String {
        let mut lines = vec!["🔍 Checking for required files...".to_string()];
        if !self.missing_required.is_empty() {
            lines.push(format!(
                "❌ Missing required files: {}",
                self.missing_required.join(", ")
            ));
            return lines.join("\n") + "\n";
        }
        lines.push("✅ All required files are present".to_string());

        lines.push("\n🔍 Checking environment variables...".to_string());
        if let Some(error) = &self.env_error {
            lines.push(format!("❌ Error reading .env file: {}", error));
        }

        lines.push("\n🔍 Checking deployment platform compatibility...".to_string());
        for platform in &self.platforms {
            lines.push(format!("\n📦 {}:", platform.name));
            lines.push(if platform.missing_files.is_empty() {
                "  ✅ All required files are present".to_string()
            } else {
                format!("  ❌ Missing files: {}", platform.missing_files.join(", "))
            });
            lines.push(if platform.missing_vars.is_empty() {
                "  ✅ All required environment variables are present".to_string()
            } else {
                format!(
                    "  ❌ Missing environment variables: {}",
                    platform.missing_vars.join(", ")
                )
            });
        }

        lines.push("\n📋 Deployment Instructions:".to_string());
        for (index, platform) in PLATFORMS.iter().enumerate() {
            lines.push(format!("\n{}. {}:", index + 1, platform.name));
            lines.extend(
                platform
                    .instructions
                    .iter()
                    .map(|instruction| format!("   - {}", instruction)),
            );
        }

        lines.push("\n✅ Deployment check completed!".to_string());
        lines.join("\n") + "\n"
    }
}

/// Runs the deployment check in `root`.
///
/// `process_env` looks a variable up in the process environment. It is a
/// parameter so the check can be run against a controlled environment.
pub async fn check_deployment<F>(root: &Path, process_env: F) -> DeployReport
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing_required = Vec::new();
    for file in REQUIRED_FILES {
        if !exists(&root.join(file)).await {
            missing_required.push(file);
        }
    }
    if !missing_required.is_empty() {
        return DeployReport {
            missing_required,
            env_error: None,
            platforms: Vec::new(),
        };
    }

    let (env_file, env_error) = match load_env_file(&root.join(".env")).await {
        Ok(env) => (env.unwrap_or_default(), None),
        Err(e) => {
            warn!("unable to read .env file: {}", e);
            (HashMap::new(), Some(e.to_string()))
        }
    };

    let mut platforms = Vec::with_capacity(PLATFORMS.len());
    for platform in &PLATFORMS {
        let mut missing_files = Vec::new();
        for file in platform.files {
            if !platform_file_exists(root, file).await {
                missing_files.push(*file);
            }
        }

        let missing_vars = platform
            .vars
            .iter()
            .copied()
            .filter(|var| !is_set(process_env(*var)) && !is_set(env_file.get(*var).cloned()))
            .collect();

        platforms.push(PlatformReport {
            name: platform.name,
            missing_files,
            missing_vars,
        });
    }

    DeployReport {
        missing_required,
        env_error,
        platforms,
    }
}

/// A platform file with a directory part is missing if its directory is.
async fn platform_file_exists(root: &Path, file: &str) -> bool {
    let path = root.join(file);
    let dir = path.parent().filter(|_| file.contains('/'));
    if let Some(dir) = dir {
        if !exists(dir).await {
            return false;
        }
    }
    exists(&path).await
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn is_set(value: Option<String>) -> bool {
    value.is_some_and(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (file, content) in files {
            let path = dir.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        dir
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn platform<'a>(report: &'a DeployReport, name: &str) -> &'a PlatformReport {
        report.platforms.iter().find(|p| p.name == name).unwrap()
    }

    #[tokio::test]
    async fn test_missing_required_files_fail() {
        let dir = project(&[("Cargo.toml", "")]);

        let report = check_deployment(dir.path(), no_env).await;

        assert_eq!(report.missing_required, vec!["config.yaml", ".env"]);
        assert!(report.platforms.is_empty());
        assert_eq!(report.exit_code(), 1);
        assert!(report.render().contains("Missing required files: config.yaml, .env"));
    }

    #[tokio::test]
    async fn test_reports_missing_platform_files() {
        let dir = project(&[
            ("Cargo.toml", ""),
            ("config.yaml", ""),
            (".env", "SESSION_ID=abc\n"),
            ("Procfile", "worker: goodchild shell"),
        ]);

        let report = check_deployment(dir.path(), no_env).await;

        assert_eq!(report.exit_code(), 0);
        assert_eq!(platform(&report, "Heroku").missing_files, vec!["app.json"]);
        assert_eq!(platform(&report, "Koyeb").missing_files, vec!["Dockerfile"]);
        assert!(platform(&report, "Railway").missing_files.is_empty());
        assert_eq!(
            platform(&report, "GitHub Actions").missing_files,
            vec!["deploy.yml", ".github/workflows/deploy.yml"]
        );
    }

    #[tokio::test]
    async fn test_nested_platform_file() {
        let dir = project(&[
            ("Cargo.toml", ""),
            ("config.yaml", ""),
            (".env", ""),
            ("deploy.yml", ""),
            (".github/workflows/deploy.yml", ""),
        ]);

        let report = check_deployment(dir.path(), no_env).await;

        assert!(platform(&report, "GitHub Actions").missing_files.is_empty());
    }

    #[tokio::test]
    async fn test_env_file_provides_variables() {
        let dir = project(&[
            ("Cargo.toml", ""),
            ("config.yaml", ""),
            (".env", "SESSION_ID=\"abc\"\n"),
        ]);

        let report = check_deployment(dir.path(), no_env).await;

        assert!(report.platforms.iter().all(|p| p.missing_vars.is_empty()));
    }

    #[tokio::test]
    async fn test_process_environment_provides_variables() {
        let dir = project(&[("Cargo.toml", ""), ("config.yaml", ""), (".env", "")]);

        let report = check_deployment(dir.path(), |var| {
            (var == "SESSION_ID").then(|| "abc".to_owned())
        })
        .await;

        assert!(report.platforms.iter().all(|p| p.missing_vars.is_empty()));
    }

    #[tokio::test]
    async fn test_reports_missing_variables() {
        let dir = project(&[("Cargo.toml", ""), ("config.yaml", ""), (".env", "SESSION_ID=\n")]);

        let report = check_deployment(dir.path(), no_env).await;
        let rendered = report.render();

        assert_eq!(report.platforms.len(), PLATFORMS.len());
        assert!(report.platforms.iter().all(|p| p.missing_vars == vec!["SESSION_ID"]));
        assert!(rendered.contains("Missing environment variables: SESSION_ID"));
        assert!(rendered.contains("📋 Deployment Instructions:"));
        assert!(rendered.ends_with("✅ Deployment check completed!\n"));
    }
}
