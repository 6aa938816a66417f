// Pre/post-kill hook script validation.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub struct HookValidator;

impl HookValidator {
    /// Confirms a hook script exists, is a regular file, and has at least
    /// one executable bit set.
    pub fn validate_hook_script(script_path: &str) -> Result<()> {
        let path = Path::new(script_path);

        if !path.exists() {
            return Err(anyhow::anyhow!("script does not exist: {script_path}"));
        }
        if !path.is_file() {
            return Err(anyhow::anyhow!("path is not a file: {script_path}"));
        }

        let metadata =
            fs::metadata(path).with_context(|| format!("failed to read metadata for {script_path}"))?;
        let mode = metadata.permissions().mode();
        if mode & 0o111 == 0 {
            return Err(anyhow::anyhow!(
                "script is not executable: {script_path} (chmod +x {script_path})"
            ));
        }

        Ok(())
    }

    /// Validate whichever of pre/post-kill scripts are configured.
    pub fn validate_hooks(pre_kill_script: Option<&str>, post_kill_script: Option<&str>) -> Result<()> {
        if let Some(script) = pre_kill_script {
            Self::validate_hook_script(script).with_context(|| format!("pre-kill script {script}"))?;
        }
        if let Some(script) = post_kill_script {
            Self::validate_hook_script(script).with_context(|| format!("post-kill script {script}"))?;
        }
        Ok(())
    }
}
