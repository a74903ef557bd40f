//! Format and range checks for every persisted field.
//!
//! All functions are pure: they never touch the filesystem, so entity
//! validation can run on a hand-edited document before anything is trusted.

use crate::config::{StoreConfig, ALLOWED_JAVA_VERSIONS};
use crate::error::{Result, StateError};
use regex::Regex;
use std::sync::LazyLock;

/// Entity that can check its own invariants.
///
/// Stores call this after every load and before every save.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Server and whitelist names: 1-63 chars, alphanumeric with internal hyphens.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid name regex")
});

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid regex")
});

static MEMORY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[MGT]$").expect("valid memory regex"));

static PLAYER_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,16}$").expect("valid player regex"));

static MOD_SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]{1,64}$").expect("valid slug regex"));

static BACKUP_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,128}$").expect("valid backup id regex"));

fn check_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StateError::validation(field, name, "must not be empty"));
    }
    if name.len() > 63 {
        return Err(StateError::validation(
            field,
            name,
            "must be at most 63 characters",
        ));
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(StateError::validation(
            field,
            name,
            "must contain only letters, digits and hyphens, and start and end with a letter or digit",
        ));
    }
    Ok(())
}

pub fn validate_server_name(name: &str) -> Result<()> {
    check_name("server name", name)
}

pub fn validate_whitelist_name(name: &str) -> Result<()> {
    check_name("whitelist name", name)
}

/// Canonical hyphenated UUID, case-insensitive.
pub fn validate_uuid(uuid: &str) -> Result<()> {
    if !UUID_PATTERN.is_match(uuid) {
        return Err(StateError::validation(
            "uuid",
            uuid,
            "must be in 8-4-4-4-12 hexadecimal form",
        ));
    }
    Ok(())
}

pub fn validate_port(port: u32) -> Result<()> {
    if port == 0 || port > StoreConfig::MAX_PORT {
        return Err(StateError::validation(
            "port",
            port,
            "must be between 1 and 65535",
        ));
    }
    Ok(())
}

pub fn validate_port_range(field: &str, start: u32, end: u32) -> Result<()> {
    validate_port(start)?;
    validate_port(end)?;
    if start > end {
        return Err(StateError::validation(
            field,
            format!("{start}-{end}"),
            "start must not exceed end",
        ));
    }
    Ok(())
}

/// Memory sizes such as `512M`, `2G` or `1T`: digits followed by one
/// uppercase unit, no space.
pub fn validate_memory(memory: &str) -> Result<()> {
    if !MEMORY_PATTERN.is_match(memory) {
        return Err(StateError::validation(
            "memory",
            memory,
            "must be digits followed by M, G or T (e.g. 2G)",
        ));
    }
    Ok(())
}

/// Convert a validated memory string into megabytes.
pub fn memory_to_megabytes(memory: &str) -> Result<u64> {
    validate_memory(memory)?;
    let (digits, unit) = memory.split_at(memory.len() - 1);
    let amount: u64 = digits
        .parse()
        .map_err(|_| StateError::validation("memory", memory, "amount is too large"))?;
    let factor = match unit {
        "M" => 1,
        "G" => 1024,
        _ => 1024 * 1024,
    };
    amount
        .checked_mul(factor)
        .ok_or_else(|| StateError::validation("memory", memory, "amount is too large"))
}

pub fn validate_version(version: &str) -> Result<()> {
    validate_token("version", version)
}

/// A non-empty value without whitespace, e.g. an image reference.
pub fn validate_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StateError::validation(field, value, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(StateError::validation(
            field,
            value,
            "must not contain whitespace",
        ));
    }
    Ok(())
}

/// Minecraft account names: 1-16 letters, digits or underscores.
pub fn validate_player_name(name: &str) -> Result<()> {
    if !PLAYER_NAME_PATTERN.is_match(name) {
        return Err(StateError::validation(
            "player name",
            name,
            "must be 1-16 letters, digits or underscores",
        ));
    }
    Ok(())
}

pub fn validate_java_version(version: u32) -> Result<()> {
    if !ALLOWED_JAVA_VERSIONS.contains(&version) {
        let allowed: Vec<String> = ALLOWED_JAVA_VERSIONS.iter().map(u32::to_string).collect();
        return Err(StateError::validation(
            "java version",
            version,
            format!("must be one of {}", allowed.join(", ")),
        ));
    }
    Ok(())
}

pub fn validate_op_level(level: u8) -> Result<()> {
    if !(1..=4).contains(&level) {
        return Err(StateError::validation(
            "operator level",
            level,
            "must be between 1 and 4",
        ));
    }
    Ok(())
}

/// Reject empty paths and any `..` segment.
///
/// Purely lexical: both `/` and `\` count as separators regardless of the
/// host platform, and the path is never resolved against the filesystem.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(StateError::validation("path", path, "must not be empty"));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StateError::validation(
            "path",
            path,
            "must not contain a parent directory segment",
        ));
    }
    Ok(())
}

/// Modrinth-style project slug.
pub fn validate_mod_slug(slug: &str) -> Result<()> {
    if !MOD_SLUG_PATTERN.is_match(slug) || slug.contains("..") {
        return Err(StateError::validation(
            "mod slug",
            slug,
            "must be 1-64 lowercase letters, digits, '-', '_' or '.'",
        ));
    }
    Ok(())
}

/// Backup ids double as archive file stems, so they must be a single safe
/// path component.
pub fn validate_backup_id(id: &str) -> Result<()> {
    if !BACKUP_ID_PATTERN.is_match(id) || id == "." || id == ".." {
        return Err(StateError::validation(
            "backup id",
            id,
            "must be 1-128 letters, digits, '.', '-' or '_'",
        ));
    }
    Ok(())
}

/// A bare file name: non-empty, no separators, no traversal.
pub fn validate_filename(field: &str, filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains(['/', '\\'])
        || filename == "."
        || filename == ".."
    {
        return Err(StateError::validation(
            field,
            filename,
            "must be a plain file name",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_names() {
        let longest = "x".repeat(63);
        let too_long = "x".repeat(64);
        for name in ["a", "lobby", "survival-2", "A1", longest.as_str()] {
            assert!(validate_server_name(name).is_ok(), "{name} should be valid");
        }
        for name in [
            "",
            "-lobby",
            "lobby-",
            "lob by",
            "lobby_1",
            "../etc",
            too_long.as_str(),
        ] {
            assert!(validate_server_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn test_uuid_case_insensitive() {
        assert!(validate_uuid("069a79f4-44e9-4726-a5be-fca90e38aaf5").is_ok());
        assert!(validate_uuid("069A79F4-44E9-4726-A5BE-FCA90E38AAF5").is_ok());
        assert!(validate_uuid("069a79f444e94726a5befca90e38aaf5").is_err());
        assert!(validate_uuid("{069a79f4-44e9-4726-a5be-fca90e38aaf5}").is_err());
        assert!(validate_uuid("069a79f4-44e9-4726-a5be-fca90e38aaz5").is_err());
    }

    #[test]
    fn test_ports() {
        assert!(validate_port(1).is_ok());
        assert!(validate_port(65535).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(65536).is_err());
        assert!(validate_port_range("game ports", 25565, 25600).is_ok());
        assert!(validate_port_range("game ports", 25600, 25565).is_err());
    }

    #[test]
    fn test_memory() {
        for ok in ["512M", "2G", "1T", "0G"] {
            assert!(validate_memory(ok).is_ok(), "{ok} should be valid");
        }
        for bad in ["2g", "2 G", "G", "2GB", "", "-1G"] {
            assert!(validate_memory(bad).is_err(), "{bad} should be invalid");
        }
        assert_eq!(memory_to_megabytes("512M").unwrap(), 512);
        assert_eq!(memory_to_megabytes("2G").unwrap(), 2048);
        assert_eq!(memory_to_megabytes("1T").unwrap(), 1_048_576);
    }

    #[test]
    fn test_version_and_java() {
        assert!(validate_version("1.21.1").is_ok());
        assert!(validate_version("").is_err());
        assert!(validate_version("1.21 pre").is_err());
        assert!(validate_java_version(17).is_ok());
        assert!(validate_java_version(16).is_err());
    }

    #[test]
    fn test_player_names() {
        assert!(validate_player_name("Notch").is_ok());
        assert!(validate_player_name("jeb_").is_ok());
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("a-b").is_err());
        assert!(validate_player_name("seventeen_chars__").is_err());
    }

    #[test]
    fn test_op_level() {
        assert!(validate_op_level(1).is_ok());
        assert!(validate_op_level(4).is_ok());
        assert!(validate_op_level(0).is_err());
        assert!(validate_op_level(5).is_err());
    }

    #[test]
    fn test_path_traversal() {
        assert!(validate_path("/srv/minecraft/data").is_ok());
        assert!(validate_path("data/..hidden").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("../data").is_err());
        assert!(validate_path("/srv/../etc").is_err());
        assert!(validate_path("C:\\srv\\..\\etc").is_err());
        assert!(validate_path("..").is_err());
    }

    #[test]
    fn test_slugs_and_ids() {
        assert!(validate_mod_slug("fabric-api").is_ok());
        assert!(validate_mod_slug("Sodium").is_err());
        assert!(validate_mod_slug("a..b").is_err());
        assert!(validate_backup_id("lobby-20250101T000000Z").is_ok());
        assert!(validate_backup_id("..").is_err());
        assert!(validate_backup_id("a/b").is_err());
        assert!(validate_filename("filename", "sodium.jar").is_ok());
        assert!(validate_filename("filename", "mods/sodium.jar").is_err());
    }
}
