use crate::domain::models::event::AudienceTags;
use crate::domain::models::user::Role;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub audience_tags: AudienceTags,
    pub lock_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            audience_tags: env::var("AUDIENCE_TAGS")
                .map(|raw| parse_audience_tags(&raw).expect("AUDIENCE_TAGS must look like tag:ROLE,tag:ROLE"))
                .unwrap_or_default(),
            lock_timeout: Duration::from_secs(
                env::var("LOCK_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("LOCK_TIMEOUT_SECS must be a number"),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            audience_tags: AudienceTags::default(),
            lock_timeout: Duration::from_secs(10),
        }
    }
}

/// "student:STUDENT,teacher:TEACHER" → tag-to-role rules.
pub fn parse_audience_tags(raw: &str) -> Result<AudienceTags, String> {
    let mut rules = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (tag, role) = entry
            .split_once(':')
            .ok_or_else(|| format!("Invalid audience tag entry: {entry}"))?;
        let role: Role = role.trim().parse()?;
        rules.push((tag.trim().to_string(), role));
    }
    Ok(AudienceTags::new(rules))
}
