//! FFmpeg Detection Module
//!
//! Locates ffmpeg/ffprobe binaries: explicit env override first, then common
//! install locations, then a PATH search.

use std::path::PathBuf;
use std::process::Command;

use super::{FFmpegError, FFmpegResult};

/// Environment variable overriding the ffmpeg binary path
pub const FFMPEG_ENV: &str = "SUBREEL_FFMPEG";
/// Environment variable overriding the ffprobe binary path
pub const FFPROBE_ENV: &str = "SUBREEL_FFPROBE";

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FfmpegInfo {
    /// Path to ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_path: PathBuf,
    /// FFmpeg version string
    pub version: String,
}

/// Detect FFmpeg binaries.
///
/// Resolution order per binary: env override, common install paths, PATH
/// search via `which`/`where`.
pub fn detect_ffmpeg() -> FFmpegResult<FfmpegInfo> {
    let ffmpeg_path = find_binary("ffmpeg", FFMPEG_ENV)?;
    let ffprobe_path = find_binary("ffprobe", FFPROBE_ENV)?;

    let version = get_ffmpeg_version(&ffmpeg_path)?;

    Ok(FfmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

fn find_binary(name: &str, env_var: &str) -> FFmpegResult<PathBuf> {
    if let Ok(overridden) = std::env::var(env_var) {
        let path = PathBuf::from(overridden);
        if path.exists() {
            return Ok(path);
        }
        return Err(FFmpegError::InvalidInput(format!(
            "{} points to a missing file: {}",
            env_var,
            path.display()
        )));
    }

    #[cfg(target_os = "windows")]
    let binary_name = format!("{name}.exe");

    #[cfg(not(target_os = "windows"))]
    let binary_name = name.to_string();

    // Try common locations first
    for dir in get_common_ffmpeg_paths() {
        let candidate = dir.join(&binary_name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    // Fall back to PATH search using `where` (Windows) or `which` (Unix)
    #[cfg(target_os = "windows")]
    let finder = "where";

    #[cfg(not(target_os = "windows"))]
    let finder = "which";

    let output = Command::new(finder)
        .arg(name)
        .output()
        .map_err(|_| FFmpegError::NotFound)?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = path_str.lines().next() {
            let trimmed = first_line.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }
    }

    Err(FFmpegError::NotFound)
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\ffmpeg\bin"));

        // Chocolatey installation
        if let Ok(programdata) = std::env::var("ProgramData") {
            paths.push(PathBuf::from(programdata).join("chocolatey").join("bin"));
        }

        // Scoop installation
        if let Ok(userprofile) = std::env::var("USERPROFILE") {
            paths.push(PathBuf::from(userprofile).join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Get FFmpeg version string
fn get_ffmpeg_version(ffmpeg_path: &PathBuf) -> FFmpegResult<String> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .map_err(FFmpegError::ProcessError)?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(
            "Failed to get FFmpeg version".to_string(),
        ));
    }

    let output_str = String::from_utf8_lossy(&output.stdout);

    // Parse version from first line: "ffmpeg version X.X.X ..."
    if let Some(first_line) = output_str.lines().next() {
        if let Some(version_part) = first_line.strip_prefix("ffmpeg version ") {
            if let Some(version) = version_part.split_whitespace().next() {
                return Ok(version.to_string());
            }
        }
        // Return the whole first line if parsing fails
        return Ok(first_line.to_string());
    }

    Err(FFmpegError::ParseError(
        "Could not parse FFmpeg version".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_paths_not_empty() {
        let paths = get_common_ffmpeg_paths();
        assert!(!paths.is_empty());
    }

    #[test]
    fn test_detect_ffmpeg() {
        // Passes if FFmpeg is installed on the system;
        // absence is not a hard failure.
        match detect_ffmpeg() {
            Ok(info) => {
                assert!(!info.version.is_empty());
                assert!(info.ffmpeg_path.exists());
                assert!(info.ffprobe_path.exists());
            }
            Err(FFmpegError::NotFound) => {
                println!("FFmpeg not found on system (expected in CI without FFmpeg)");
            }
            Err(e) => {
                panic!("Unexpected error: {}", e);
            }
        }
    }
}
