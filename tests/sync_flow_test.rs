//! End-to-end chain runs over a realistic temp project: catalogs in
//! `locales/`, code under `src/`, chains driven the way the router
//! drives them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;

use localesync::catalog::parse_po;
use localesync::{
    ChainRegistry, CodeScanner, FileCategory, LockTable, NullBackend, ProcessingContext, Settings,
};

struct Project {
    _dir: TempDir,
    root: PathBuf,
    settings: Arc<Settings>,
    locks: Arc<LockTable>,
    scanner: Arc<CodeScanner>,
    registry: ChainRegistry,
}

impl Project {
    fn new(targets: &[&str], machine_translate: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("locales")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();

        let settings = Arc::new(Settings {
            project_root: Some(root.clone()),
            target_locales: targets.iter().map(|s| s.to_string()).collect(),
            stages: localesync::config::StageConfig {
                machine_translate,
                ..Default::default()
            },
            ..Settings::default()
        });

        let locks = Arc::new(LockTable::new());
        let scanner = Arc::new(CodeScanner::new(settings.clone()));
        let registry = ChainRegistry::standard(
            settings.clone(),
            locks.clone(),
            scanner.clone(),
            Arc::new(NullBackend),
        );

        Self {
            _dir: dir,
            root,
            settings,
            locks,
            scanner,
            registry,
        }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        std::fs::write(&path, content).unwrap();
        path
    }

    async fn run(&self, category: FileCategory, path: &Path) -> ProcessingContext {
        let mut ctx = ProcessingContext::for_event(path, category, &self.settings);
        self.registry.run(category, &mut ctx).await.unwrap();
        ctx
    }

    fn read_json(&self, rel: &str) -> Value {
        let text = std::fs::read_to_string(self.root.join(rel)).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

#[tokio::test]
async fn test_catalog_edit_exports_po() {
    let project = Project::new(&[], false);
    let catalog = project.write(
        "locales/de.json",
        r#"{"menu":{"file":"Datei","edit":"Bearbeiten"},"title":"App"}"#,
    );

    project.run(FileCategory::LocaleJson, &catalog).await;

    let po = std::fs::read_to_string(project.root.join("locales/de.po")).unwrap();
    let entries = parse_po(&po, Path::new("de.po")).unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.msgid.as_str()).collect();
    assert_eq!(ids, ["menu.file", "menu.edit", "title"]);
    assert_eq!(entries[0].msgstr, "Datei");

    // The write is registered for self-write suppression
    assert!(project.locks.has_lock(&project.root.join("locales/de.po")));
}

#[tokio::test]
async fn test_po_edit_flows_back_into_catalog() {
    let project = Project::new(&[], false);
    project.write("locales/fr.json", r#"{"greeting":"","untouched":"Reste"}"#);
    let po = project.write(
        "locales/fr.po",
        concat!(
            "msgid \"\"\n",
            "msgstr \"Language: fr\\n\"\n",
            "\n",
            "msgid \"greeting\"\n",
            "msgstr \"Bonjour\"\n",
            "\n",
            "msgid \"added.later\"\n",
            "msgstr \"Plus tard\"\n",
        ),
    );

    project.run(FileCategory::Po, &po).await;

    let doc = project.read_json("locales/fr.json");
    assert_eq!(doc["greeting"], "Bonjour");
    assert_eq!(doc["untouched"], "Reste");
    assert_eq!(doc["added"]["later"], "Plus tard");
}

#[tokio::test]
async fn test_code_change_seeds_source_catalog() {
    let project = Project::new(&[], false);
    project.write("locales/en.json", r#"{"existing":"Here"}"#);
    let source = project.write(
        "src/App.tsx",
        "export const App = () => <h1>{t('page.title', 'Welcome')}</h1>;",
    );

    let ctx = project.run(FileCategory::SourceCode, &source).await;
    assert!(ctx.has_changes.is_true());

    let doc = project.read_json("locales/en.json");
    assert_eq!(doc["existing"], "Here");
    assert_eq!(doc["page"]["title"], "Welcome");
}

#[tokio::test]
async fn test_unchanged_code_leaves_catalog_alone() {
    let project = Project::new(&[], false);
    let source = project.write("src/app.js", "t('only.key');");

    // First run records the file and writes the catalog
    project.run(FileCategory::SourceCode, &source).await;
    let first = project.read_json("locales/en.json");

    // Same bytes again: hash short-circuit, no second write
    let ctx = project.run(FileCategory::SourceCode, &source).await;
    assert!(!ctx.has_changes.is_true());
    assert_eq!(project.read_json("locales/en.json"), first);
}

#[tokio::test]
async fn test_key_removal_escalates_to_full_scan() {
    let project = Project::new(&[], false);
    let a = project.write("src/a.js", "t('shared.key'); t('a.only');");
    project.write("src/b.js", "t('shared.key');");
    project.scanner.full_scan().await.unwrap();

    // Dropping a key from one file cannot be judged locally
    project.write("src/a.js", "t('a.only');");
    let ctx = project.run(FileCategory::SourceCode, &a).await;

    assert!(matches!(
        ctx.scan_outcome,
        Some(localesync::ScanOutcome::FullScan(_))
    ));
    // The full scan proves the key is still used elsewhere
    let used = project.scanner.used_keys();
    assert!(used.contains("shared.key"));
    assert!(used.contains("a.only"));
}

#[tokio::test]
async fn test_source_catalog_fans_out_to_targets() {
    let project = Project::new(&["de"], true);
    project.write("locales/de.json", r#"{"old":"Alt"}"#);
    let catalog = project.write("locales/en.json", r#"{"old":"Old","fresh":"Fresh text"}"#);

    project.run(FileCategory::LocaleJson, &catalog).await;

    // NullBackend echoes the source text into the gap
    let de = project.read_json("locales/de.json");
    assert_eq!(de["old"], "Alt");
    assert_eq!(de["fresh"], "Fresh text");

    // And the source catalog still produced its own export
    assert!(project.root.join("locales/en.po").exists());
}

#[tokio::test]
async fn test_target_catalog_does_not_fan_out() {
    let project = Project::new(&["de"], true);
    let catalog = project.write("locales/de.json", r#"{"a":"Wert"}"#);

    project.run(FileCategory::LocaleJson, &catalog).await;

    // Target-locale edits export a PO but never touch other catalogs
    assert!(project.root.join("locales/de.po").exists());
    assert!(!project.root.join("locales/en.json").exists());
}

#[tokio::test]
async fn test_missing_input_is_a_silent_noop() {
    let project = Project::new(&[], false);
    let ghost = project.root.join("locales/never-existed.json");

    let ctx = project.run(FileCategory::LocaleJson, &ghost).await;

    assert!(ctx.content.is_none());
    assert!(!project.root.join("locales/never-existed.po").exists());
    assert!(project.locks.is_empty());
}

#[tokio::test]
async fn test_malformed_catalog_produces_no_export() {
    let project = Project::new(&[], false);
    let catalog = project.write("locales/de.json", "{ not json at all");

    project.run(FileCategory::LocaleJson, &catalog).await;

    assert!(!project.root.join("locales/de.po").exists());
    assert!(project.locks.is_empty());
}
