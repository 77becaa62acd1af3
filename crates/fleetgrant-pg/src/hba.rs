//! `pg_ident.conf` and `pg_hba.conf` lines for certificate access

use std::path::Path;

use fleetgrant_core::AllowListEntry;

use crate::error::PgError;

/// Identity map the reporting host's certificates are listed under
pub const IDENT_MAP_NAME: &str = "fleetgrant-map";

/// First line of the managed block in `pg_hba.conf`
pub const HBA_BLOCK_BEGIN: &str = "# BEGIN fleetgrant";

/// Last line of the managed block in `pg_hba.conf`
pub const HBA_BLOCK_END: &str = "# END fleetgrant";

/// First server major version accepting `clientcert=verify-full`
const VERIFY_FULL_SINCE: u32 = 12;

/// Line mapping the certificate identity to the database user
#[must_use]
pub fn ident_line(entry: &AllowListEntry) -> String {
    format!("{IDENT_MAP_NAME} {} {}", entry.cert_identity, entry.user)
}

/// Server major version from `<root>/<version>/data/pg_ident.conf`
///
/// `9.4` gives 9, `11` gives 11.
#[must_use]
pub fn server_major_version(ident_map_path: &str) -> Option<u32> {
    let version = Path::new(ident_map_path)
        .parent()?
        .parent()?
        .file_name()?
        .to_str()?;
    version.split('.').next()?.parse().ok()
}

/// `hostssl` rules accepting the mapped certificate from any address
///
/// The `cert` method already demands a client certificate. The explicit
/// `clientcert=verify-full` option is only understood from version 12 on and
/// makes the whole file invalid before that.
#[must_use]
pub fn hba_lines(entry: &AllowListEntry) -> Vec<String> {
    let verify_full = server_major_version(&entry.ident_map_path)
        .is_some_and(|major| major >= VERIFY_FULL_SINCE);
    let suffix = if verify_full {
        " clientcert=verify-full"
    } else {
        ""
    };

    [&entry.ipv4_mask, &entry.ipv6_mask]
        .into_iter()
        .map(|mask| {
            format!(
                "hostssl {} {} {mask} cert map={IDENT_MAP_NAME}{suffix}",
                entry.database, entry.user
            )
        })
        .collect()
}

/// Connection type, database, user and address of a rule
fn rule_key(line: &str) -> Vec<&str> {
    line.split_whitespace().take(4).collect()
}

/// Place `rules` in the managed block at the top of `pg_hba.conf`
///
/// Rules are matched first to last, so the block goes before every existing
/// rule. Block lines for the same connection type, database, user and address
/// are replaced; other block lines are kept. Copies of `rules` outside the
/// block are dropped.
#[must_use]
pub fn merge_hba_rules(current: &str, rules: &[String]) -> String {
    let mut block: Vec<String> = Vec::new();
    let mut rest: Vec<&str> = Vec::new();
    let mut in_block = false;

    for line in current.lines() {
        match line {
            HBA_BLOCK_BEGIN => in_block = true,
            HBA_BLOCK_END => in_block = false,
            _ if in_block => block.push(line.to_string()),
            _ if rules.iter().any(|rule| rule == line) => {}
            _ => rest.push(line),
        }
    }

    for rule in rules {
        let key = rule_key(rule);
        match block.iter_mut().find(|line| rule_key(line) == key) {
            Some(existing) => existing.clone_from(rule),
            None => block.push(rule.clone()),
        }
    }

    let mut out = String::with_capacity(current.len() + 128);
    out.push_str(HBA_BLOCK_BEGIN);
    out.push('\n');
    for line in block {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(HBA_BLOCK_END);
    out.push('\n');
    for line in rest {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// `pg_hba.conf` living next to the identity map
///
/// # Errors
/// Returns `InvalidPath` when the identity map path has no parent directory.
pub fn hba_path(ident_map_path: &str) -> Result<String, PgError> {
    let path = Path::new(ident_map_path);
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            Ok(dir.join("pg_hba.conf").to_string_lossy().into_owned())
        }
        _ => Err(PgError::InvalidPath(ident_map_path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: &str) -> AllowListEntry {
        AllowListEntry {
            user: "fleetgrant_reader".to_string(),
            database: "pe-rbac".to_string(),
            cert_identity: "report.example".to_string(),
            ident_map_path: format!(
                "/opt/puppetlabs/server/data/postgresql/{version}/data/pg_ident.conf"
            ),
            ipv4_mask: "0.0.0.0/0".to_string(),
            ipv6_mask: "::/0".to_string(),
        }
    }

    #[test]
    fn test_ident_line() {
        assert_eq!(
            ident_line(&entry("11")),
            "fleetgrant-map report.example fleetgrant_reader"
        );
    }

    #[test]
    fn test_server_major_version() {
        assert_eq!(server_major_version(&entry("9.4").ident_map_path), Some(9));
        assert_eq!(server_major_version(&entry("14").ident_map_path), Some(14));
        assert_eq!(server_major_version("pg_ident.conf"), None);
    }

    #[test]
    fn test_hba_lines_cover_both_families() {
        let lines = hba_lines(&entry("11"));
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "hostssl pe-rbac fleetgrant_reader 0.0.0.0/0 cert map=fleetgrant-map"
        );
        assert!(lines[1].contains(" ::/0 cert map=fleetgrant-map"));
    }

    #[test]
    fn test_hba_lines_before_12_omit_clientcert() {
        for line in hba_lines(&entry("9.4")) {
            assert!(!line.contains("clientcert"), "{line}");
        }
    }

    #[test]
    fn test_hba_lines_from_12_verify_full() {
        let lines = hba_lines(&entry("13"));
        assert_eq!(
            lines[0],
            "hostssl pe-rbac fleetgrant_reader 0.0.0.0/0 cert map=fleetgrant-map \
             clientcert=verify-full"
        );
    }

    #[test]
    fn test_merge_puts_block_before_existing_rules() {
        let current = "# TYPE DATABASE USER ADDRESS METHOD\n\
                       local all all peer\n\
                       hostssl all all 0.0.0.0/0 md5\n";
        let rules = hba_lines(&entry("9.4"));

        let merged = merge_hba_rules(current, &rules);
        let lines: Vec<&str> = merged.lines().collect();

        assert_eq!(lines[0], HBA_BLOCK_BEGIN);
        assert_eq!(lines[1], rules[0]);
        assert_eq!(lines[2], rules[1]);
        assert_eq!(lines[3], HBA_BLOCK_END);
        let ours = lines.iter().position(|l| *l == rules[0]).unwrap();
        let broad = lines
            .iter()
            .position(|l| *l == "hostssl all all 0.0.0.0/0 md5")
            .unwrap();
        assert!(ours < broad);
    }

    #[test]
    fn test_merge_is_idempotent_and_accumulates() {
        let rbac = hba_lines(&entry("9.4"));
        let mut inventory_entry = entry("9.4");
        inventory_entry.database = "pe-inventory".to_string();
        let inventory = hba_lines(&inventory_entry);

        let once = merge_hba_rules("local all all peer\n", &rbac);
        assert_eq!(merge_hba_rules(&once, &rbac), once);

        let both = merge_hba_rules(&once, &inventory);
        assert_eq!(both.matches(HBA_BLOCK_BEGIN).count(), 1);
        assert!(both.contains(&rbac[0]));
        assert!(both.contains(&inventory[1]));
        assert!(both.ends_with(&format!("{HBA_BLOCK_END}\nlocal all all peer\n")));
    }

    #[test]
    fn test_merge_moves_appended_rules_and_replaces_options() {
        let stale = "hostssl pe-rbac fleetgrant_reader 0.0.0.0/0 cert map=fleetgrant-map \
                     clientcert=verify-full";
        let current = format!(
            "{HBA_BLOCK_BEGIN}\n{stale}\n{HBA_BLOCK_END}\n\
             hostssl all all 0.0.0.0/0 md5\n\
             hostssl pe-rbac fleetgrant_reader ::/0 cert map=fleetgrant-map\n"
        );
        let rules = hba_lines(&entry("9.4"));

        let merged = merge_hba_rules(&current, &rules);

        assert!(!merged.contains("clientcert"));
        assert_eq!(merged.matches(&rules[1]).count(), 1);
        assert!(merged.ends_with("hostssl all all 0.0.0.0/0 md5\n"));
    }

    #[test]
    fn test_hba_path_is_sibling() {
        assert_eq!(
            hba_path(&entry("11").ident_map_path).unwrap(),
            "/opt/puppetlabs/server/data/postgresql/11/data/pg_hba.conf"
        );
        assert!(hba_path("pg_ident.conf").is_err());
    }
}
