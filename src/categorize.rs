use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// One category with its lowercase substring patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub label: String,
    pub patterns: Vec<String>,
}

/// A title-based fallback rule, consulted only when no identity pattern hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleRule {
    pub pattern: String,
    pub label: String,
}

/// Ordered category table. Declaration order is part of the contract: when
/// patterns overlap across categories, the earliest declared category wins.
/// Read-only after startup, so it can be shared across tasks without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRules {
    pub categories: Vec<CategoryEntry>,
    pub title_rules: Vec<TitleRule>,
}

impl CategoryRules {
    /// Load a table from a JSON file, for deployments that override the
    /// built-in one.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read category rules from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse category rules in {}", path.display()))
    }

    /// Map a process/window identity to a category label.
    ///
    /// The identity is matched first against every category's patterns in
    /// declaration order; if nothing hits, the window title is matched against
    /// the fallback rules (web apps inside a browser mostly). Pure and
    /// side-effect free.
    pub fn categorize(&self, identity: &str, title: &str) -> &str {
        let identity = identity.to_lowercase();
        for entry in &self.categories {
            if entry.patterns.iter().any(|p| identity.contains(p.as_str())) {
                return &entry.label;
            }
        }

        let title = title.to_lowercase();
        for rule in &self.title_rules {
            if title.contains(rule.pattern.as_str()) {
                return &rule.label;
            }
        }

        UNCATEGORIZED
    }
}

fn entry(label: &str, patterns: &[&str]) -> CategoryEntry {
    CategoryEntry {
        label: label.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            categories: vec![
                entry(
                    "Entertainment",
                    &[
                        "vlc",
                        "spotify",
                        "netflix",
                        "prime video",
                        "xbox",
                        "steam",
                        "discord",
                        "youtube music",
                        "itunes",
                        "lightroom",
                    ],
                ),
                entry(
                    "Code",
                    &[
                        "code",
                        "devenv",
                        "pycharm",
                        "webstorm",
                        "intellij",
                        "clion",
                        "github",
                        "git",
                        "docker desktop",
                        "postman",
                        "node",
                        "python",
                        "wsl",
                        "notepad++",
                        "xampp-control",
                        "wampmanager",
                        "mongodbcompass",
                        "mysqlworkbench",
                    ],
                ),
                entry(
                    "Design",
                    &[
                        "photoshop",
                        "illustrator",
                        "figma",
                        "canva",
                        "xd",
                        "blender",
                        "resolve",
                        "premiere pro",
                        "afterfx",
                        "krita",
                        "gimp",
                        "inkscape",
                    ],
                ),
                entry(
                    "Documenting",
                    &[
                        "winword",
                        "excel",
                        "powerpnt",
                        "onenote",
                        "notion",
                        "obsidian",
                        "evernote",
                        "soffice",
                        "typora",
                        "acrobat",
                        "foxitreader",
                    ],
                ),
                entry(
                    "Utility",
                    &[
                        "7zfm",
                        "winrar",
                        "sharex",
                        "everything",
                        "powertoys",
                        "rufus",
                        "cpuz",
                        "hwmonitor",
                        "crystaldiskinfo",
                        "obs64",
                        "nvidia control panel",
                        "amd software",
                    ],
                ),
                entry(
                    "Browsing",
                    &["chrome", "msedge", "firefox", "brave", "opera", "tor browser"],
                ),
                entry(
                    "Messaging",
                    &["whatsapp", "telegram", "slack", "teams", "skype", "zoom"],
                ),
                entry(
                    "Miscellaneous",
                    &[
                        "googledrivesync",
                        "onedrive",
                        "dropbox",
                        "steamcmd",
                        "epicgameslauncher",
                        "battle.net",
                    ],
                ),
                entry(
                    "Productivity",
                    &[
                        "todoist",
                        "trello",
                        "asana",
                        "clockify",
                        "rescuetime",
                        "forest",
                        "focustodo",
                        "pomodone",
                    ],
                ),
                entry(
                    "Writing",
                    &["grammarly", "hemingway", "scrivener", "focuswriter"],
                ),
                entry(
                    "Admin",
                    &[
                        "taskmgr",
                        "windowsterminal",
                        "cmd",
                        "powershell",
                        "regedit",
                        "diskmgmt",
                        "devmgmt",
                        "mmc",
                    ],
                ),
            ],
            title_rules: vec![
                TitleRule {
                    pattern: "google docs".into(),
                    label: "Documenting".into(),
                },
                TitleRule {
                    pattern: "youtube".into(),
                    label: "Entertainment".into(),
                },
                TitleRule {
                    pattern: "github".into(),
                    label: "Code".into(),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_apps_resolve_deterministically() {
        let rules = CategoryRules::default();
        assert_eq!(rules.categorize("Discord.exe", ""), "Entertainment");
        assert_eq!(rules.categorize("Code.exe", ""), "Code");
        assert_eq!(rules.categorize("unknownapp", ""), UNCATEGORIZED);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rules = CategoryRules::default();
        assert_eq!(rules.categorize("DISCORD.EXE", ""), "Entertainment");
        assert_eq!(rules.categorize("FiReFoX", ""), "Browsing");
    }

    #[test]
    fn title_fallback_applies_when_identity_misses() {
        let rules = CategoryRules::default();
        assert_eq!(rules.categorize("", "Watching on YouTube"), "Entertainment");
        assert_eq!(rules.categorize("", "Quarterly plan - Google Docs"), "Documenting");
    }

    #[test]
    fn identity_match_shadows_title_fallback() {
        let rules = CategoryRules::default();
        // Browser identity wins even though the title would say Entertainment.
        assert_eq!(
            rules.categorize("firefox", "Watching on YouTube"),
            "Browsing"
        );
    }

    #[test]
    fn earlier_category_wins_on_overlapping_patterns() {
        let rules = CategoryRules {
            categories: vec![
                entry("Work", &["mail"]),
                entry("Comms", &["mail", "chat"]),
            ],
            title_rules: vec![],
        };
        assert_eq!(rules.categorize("mail.exe", ""), "Work");
        assert_eq!(rules.categorize("chat.exe", ""), "Comms");
    }

    #[test]
    fn empty_identity_and_title_fall_through_to_default() {
        let rules = CategoryRules::default();
        assert_eq!(rules.categorize("", ""), UNCATEGORIZED);
    }
}
