use anyhow::{Context, Error, Result};

/// Loads a dotenv file into the process environment.
///
/// Variables already set in the environment are left alone. Without an
/// explicit path a missing `.env` is fine, the environment is used as is.
pub(crate) fn load_env_file(path: Option<&str>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_filename(path)
                .with_context(|| format!("failed loading env file: {}", path))?;
            debug!("loaded env file: {}", path);
        }
        None => match dotenvy::dotenv() {
            Ok(found) => debug!("loaded env file: {}", found.to_string_lossy()),
            Err(e) if e.not_found() => debug!("no .env file found, using process environment"),
            Err(e) => return Err(Error::new(e).context("failed loading .env file")),
        },
    }
    Ok(())
}
