use super::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use prodpatch_backup::{read_descriptor, BackupStore, Descriptor};
use prodpatch_core::{
    Config, ExtensionSource, ExtraFeatures, FeaturePatchData, PackageEntry, PatchConfig,
};
use serde_json::{json, Value};

fn document(value: Value) -> Descriptor {
    match value {
        Value::Object(map) => map,
        other => panic!("test document must be an object, got {other}"),
    }
}

fn sample_feature_data() -> FeaturePatchData {
    FeaturePatchData::from(document(json!({
        "extensionEnabledApiProposals": {"GitHub.copilot": ["inlineCompletionsAdditions"]},
        "tasConfig": {"endpoint": "https://default.exp-tas.com/vscode/ab"},
        "extensionKind": {"vscodevim.vim": ["ui"]},
        "auth": {"loginUrl": "https://login.microsoftonline.com/common/oauth2/authorize"},
        "trustedExtensionAuthAccess": ["vscode.github"],
        "tunnelApplicationName": "code-tunnel"
    })))
}

fn sample_product() -> Descriptor {
    document(json!({
        "nameShort": "VSCodium",
        "dataFolderName": ".vscode-oss",
        "extensionsGallery": {
            "serviceUrl": "https://open-vsx.org/vscode/gallery",
            "itemUrl": "https://open-vsx.org/vscode/item"
        },
        "linkProtectionTrustedDomains": ["https://open-vsx.org"],
        "tasConfig": {"endpoint": "stale"}
    }))
}

fn full_config() -> PatchConfig {
    PatchConfig {
        extra_features: Some(ExtraFeatures::Toggle(true)),
        extension_source: Some(ExtensionSource::Microsoft),
        data_dir: Some(PathBuf::from(".vscodium-ms")),
    }
}

#[test]
fn apply_patch_twice_is_idempotent() {
    let data = sample_feature_data();
    let configs = [
        full_config(),
        PatchConfig {
            extension_source: Some(ExtensionSource::OpenVsx),
            ..PatchConfig::default()
        },
        PatchConfig {
            extra_features: Some(ExtraFeatures::Categories(vec!["auth".to_string()])),
            extension_source: Some(ExtensionSource::Unrecognized("gitea".to_string())),
            ..PatchConfig::default()
        },
        PatchConfig::default(),
    ];

    for config in &configs {
        let mut once = sample_product();
        apply_patch(&mut once, config, &data);
        let mut twice = once.clone();
        apply_patch(&mut twice, config, &data);
        assert_eq!(once, twice, "pipeline must be idempotent for {config:?}");
    }
}

#[test]
fn auth_category_touches_only_auth_keys() {
    let data = sample_feature_data();
    let original = sample_product();
    let mut patched = original.clone();
    let config = PatchConfig {
        extra_features: Some(ExtraFeatures::Categories(vec!["auth".to_string()])),
        ..PatchConfig::default()
    };

    let report = apply_patch(&mut patched, &config, &data);

    assert_eq!(report.touched_keys, vec!["auth", "trustedExtensionAuthAccess"]);
    assert_eq!(patched["auth"], data.get("auth").cloned().expect("auth data"));
    assert_eq!(patched["trustedExtensionAuthAccess"], json!(["vscode.github"]));
    for (key, value) in &original {
        assert_eq!(patched.get(key), Some(value), "key '{key}' must be unchanged");
    }
    assert_eq!(patched.len(), original.len() + 2);
}

#[test]
fn disabled_features_leave_document_unchanged() {
    let data = sample_feature_data();
    for extra_features in [
        None,
        Some(ExtraFeatures::Toggle(false)),
        Some(ExtraFeatures::Categories(Vec::new())),
    ] {
        let mut patched = sample_product();
        let mut report = PatchReport::default();
        apply_features(
            &mut patched,
            &PatchConfig {
                extra_features,
                ..PatchConfig::default()
            },
            &data,
            &mut report,
        );
        assert_eq!(patched, sample_product());
        assert!(report.touched_keys.is_empty());
    }
}

#[test]
fn all_features_skip_keys_missing_from_patch_data() {
    let data = sample_feature_data();
    let mut patched = document(json!({}));
    let mut report = PatchReport::default();
    apply_features(
        &mut patched,
        &PatchConfig {
            extra_features: Some(ExtraFeatures::Toggle(true)),
            ..PatchConfig::default()
        },
        &data,
        &mut report,
    );

    assert_eq!(patched.len(), 6);
    assert!(patched.get("configurationSync.store").is_none());
    assert_eq!(patched["tunnelApplicationName"], "code-tunnel");
    assert!(report.warnings.is_empty());
}

#[test]
fn unknown_category_is_silently_ignored() {
    let data = sample_feature_data();
    let mut patched = sample_product();
    let report = apply_patch(
        &mut patched,
        &PatchConfig {
            extra_features: Some(ExtraFeatures::Categories(vec!["telemtry".to_string()])),
            ..PatchConfig::default()
        },
        &data,
    );
    assert_eq!(patched, sample_product());
    assert!(report.warnings.is_empty());
}

#[test]
fn microsoft_marketplace_drops_openvsx_trusted_domain_key() {
    let mut patched = sample_product();
    let mut report = PatchReport::default();
    apply_marketplace(
        &mut patched,
        &PatchConfig {
            extension_source: Some(ExtensionSource::Microsoft),
            ..PatchConfig::default()
        },
        &mut report,
    );

    assert_eq!(
        patched[GALLERY_KEY]["serviceUrl"],
        "https://marketplace.visualstudio.com/_apis/public/gallery"
    );
    assert!(patched.get(TRUSTED_DOMAINS_KEY).is_none());
    assert_eq!(report.touched_keys, vec![GALLERY_KEY, TRUSTED_DOMAINS_KEY]);
}

#[test]
fn microsoft_marketplace_keeps_other_trusted_domains() {
    let mut patched = document(json!({
        "linkProtectionTrustedDomains": [
            "https://github.com",
            "https://open-vsx.org",
            "https://example.test"
        ]
    }));
    let mut report = PatchReport::default();
    apply_marketplace(
        &mut patched,
        &PatchConfig {
            extension_source: Some(ExtensionSource::Microsoft),
            ..PatchConfig::default()
        },
        &mut report,
    );

    assert_eq!(
        patched[TRUSTED_DOMAINS_KEY],
        json!(["https://github.com", "https://example.test"])
    );
}

#[test]
fn prune_trusted_domains_handles_absent_and_empty_lists() {
    let mut absent = document(json!({"foo": "bar"}));
    assert!(!prune_trusted_domains(&mut absent));
    assert_eq!(absent, document(json!({"foo": "bar"})));

    let mut empty = document(json!({"linkProtectionTrustedDomains": []}));
    assert!(prune_trusted_domains(&mut empty));
    assert!(empty.is_empty());
}

#[test]
fn prune_trusted_domains_preserves_key_order() {
    let mut patched = document(json!({
        "a": 1,
        "linkProtectionTrustedDomains": ["https://open-vsx.org"],
        "b": 2,
        "c": 3
    }));
    prune_trusted_domains(&mut patched);
    assert_eq!(
        patched.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
}

#[test]
fn openvsx_marketplace_installs_gallery_without_trusted_domains() {
    let data = sample_feature_data();
    let mut patched = document(json!({"foo": "bar"}));
    apply_patch(
        &mut patched,
        &PatchConfig {
            extension_source: Some(ExtensionSource::OpenVsx),
            ..PatchConfig::default()
        },
        &data,
    );

    assert_eq!(
        Value::Object(patched),
        json!({
            "foo": "bar",
            "extensionsGallery": {
                "serviceUrl": "https://open-vsx.org/vscode/gallery",
                "itemUrl": "https://open-vsx.org/vscode/item"
            }
        })
    );
}

#[test]
fn unrecognized_marketplace_warns_and_skips() {
    let mut patched = sample_product();
    let mut report = PatchReport::default();
    apply_marketplace(
        &mut patched,
        &PatchConfig {
            extension_source: Some(ExtensionSource::Unrecognized("gitea".to_string())),
            ..PatchConfig::default()
        },
        &mut report,
    );

    assert_eq!(patched, sample_product());
    assert_eq!(report.warnings, vec!["invalid marketplace: gitea"]);
}

#[test]
fn data_dir_overrides_folder_name_only_when_set() {
    let mut patched = sample_product();
    let mut report = PatchReport::default();
    apply_data_dir(&mut patched, &PatchConfig::default(), &mut report);
    assert_eq!(patched[DATA_FOLDER_KEY], ".vscode-oss");

    apply_data_dir(&mut patched, &full_config(), &mut report);
    assert_eq!(patched[DATA_FOLDER_KEY], ".vscodium-ms");
    assert_eq!(report.touched_keys, vec![DATA_FOLDER_KEY]);
}

fn scratch_dir() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "prodpatch-engine-tests-{}-{nanos}-{seq}",
        std::process::id()
    ))
}

struct Fixture {
    root: PathBuf,
    config: Config,
    store: BackupStore,
    live: PathBuf,
}

impl Fixture {
    fn new(live_content: &str, defaults: PatchConfig, patch_override: Option<PatchConfig>) -> Self {
        let root = scratch_dir();
        let live = root.join("install").join("product.json");
        fs::create_dir_all(live.parent().expect("live has parent")).expect("must create dir");
        fs::write(&live, live_content).expect("must write live descriptor");

        let mut config = Config {
            patch: defaults,
            ..Config::default()
        };
        config.packages.insert(
            "vscodium".to_string(),
            PackageEntry {
                product_json_path: live.clone(),
                patch_override,
            },
        );

        let store = BackupStore::new(root.join("backups"));
        Self {
            root,
            config,
            store,
            live,
        }
    }

    fn live_document(&self) -> Descriptor {
        read_descriptor(&self.live).expect("must read live descriptor")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn assert_backup_content(path: &Path, expected: &str) {
    assert_eq!(fs::read_to_string(path).expect("must read backup"), expected);
}

#[test]
fn patch_package_end_to_end_openvsx() {
    let fixture = Fixture::new(
        "{\"foo\":\"bar\"}",
        PatchConfig {
            extension_source: Some(ExtensionSource::OpenVsx),
            ..PatchConfig::default()
        },
        None,
    );
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());

    let outcome = patcher
        .patch_package("vscodium", false, &data)
        .expect("must patch package");

    assert_eq!(outcome.source, PatchSource::Live);
    let initial = outcome
        .initial_backup
        .as_ref()
        .expect("first patch must take a backup");
    assert_backup_content(&initial.entry.path, "{\"foo\":\"bar\"}");
    assert_eq!(
        Value::Object(fixture.live_document()),
        json!({
            "foo": "bar",
            "extensionsGallery": {
                "serviceUrl": "https://open-vsx.org/vscode/gallery",
                "itemUrl": "https://open-vsx.org/vscode/item"
            }
        })
    );
    assert_eq!(
        fs::read_to_string(&fixture.live).expect("must read live"),
        "{\n  \"foo\": \"bar\",\n  \"extensionsGallery\": {\n    \"serviceUrl\": \"https://open-vsx.org/vscode/gallery\",\n    \"itemUrl\": \"https://open-vsx.org/vscode/item\"\n  }\n}"
    );
}

#[test]
fn patch_package_from_backup_ignores_previous_patches() {
    let fixture = Fixture::new(
        "{\"foo\":\"bar\"}",
        PatchConfig {
            data_dir: Some(PathBuf::from(".first")),
            ..PatchConfig::default()
        },
        None,
    );
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());
    patcher
        .patch_package("vscodium", true, &data)
        .expect("first patch");

    let mut config = fixture.config.clone();
    config.patch = PatchConfig {
        extension_source: Some(ExtensionSource::Microsoft),
        ..PatchConfig::default()
    };
    let patcher = Patcher::new(&config, fixture.store.clone());
    let outcome = patcher
        .patch_package("vscodium", true, &data)
        .expect("second patch");

    assert!(outcome.initial_backup.is_none());
    assert!(matches!(outcome.source, PatchSource::Backup(_)));
    let live = fixture.live_document();
    assert!(live.get(DATA_FOLDER_KEY).is_none());
    assert_eq!(live["foo"], "bar");
    assert!(live.get(GALLERY_KEY).is_some());
    assert_eq!(
        fixture
            .store
            .list_backups("vscodium")
            .expect("must list")
            .len(),
        1
    );
}

#[test]
fn patch_package_from_backup_falls_back_to_live_when_backup_fails() {
    let mut fixture = Fixture::new(
        "{\"foo\":\"bar\"}",
        PatchConfig {
            data_dir: Some(PathBuf::from(".vscodium-ms")),
            ..PatchConfig::default()
        },
        None,
    );
    // A regular file where the backups directory should be.
    let blocked = fixture.root.join("backups-blocked");
    fs::write(&blocked, "not a directory").expect("must write blocker");
    fixture.store = BackupStore::new(blocked);
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());

    let outcome = patcher
        .patch_package("vscodium", true, &data)
        .expect("backup failure must not abort a from-backup patch");

    assert_eq!(outcome.source, PatchSource::Live);
    assert!(outcome.initial_backup.is_none());
    let warnings = outcome.warnings().collect::<Vec<_>>();
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].starts_with("failed to create initial backup: "));
    assert_eq!(warnings[1], "no backup available; patched the live descriptor");
    let live = fixture.live_document();
    assert_eq!(live["foo"], "bar");
    assert_eq!(live[DATA_FOLDER_KEY], ".vscodium-ms");

    patcher
        .patch_package("vscodium", false, &data)
        .expect_err("backup failure is fatal without from_backup");
}

#[test]
fn patch_package_uses_package_override() {
    let fixture = Fixture::new(
        "{}",
        PatchConfig {
            extension_source: Some(ExtensionSource::Microsoft),
            data_dir: Some(PathBuf::from(".vscodium-ms")),
            ..PatchConfig::default()
        },
        Some(PatchConfig {
            extension_source: Some(ExtensionSource::OpenVsx),
            ..PatchConfig::default()
        }),
    );
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());
    patcher
        .patch_package("vscodium", false, &data)
        .expect("must patch");

    let live = fixture.live_document();
    assert_eq!(
        live[GALLERY_KEY]["serviceUrl"],
        "https://open-vsx.org/vscode/gallery"
    );
    assert_eq!(live[DATA_FOLDER_KEY], ".vscodium-ms");
}

#[test]
fn patch_package_reports_marketplace_warning_and_still_writes() {
    let fixture = Fixture::new(
        "{\"foo\":\"bar\"}",
        PatchConfig {
            extension_source: Some(ExtensionSource::Unrecognized("gitea".to_string())),
            data_dir: Some(PathBuf::from(".vscodium-ms")),
            ..PatchConfig::default()
        },
        None,
    );
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());
    let outcome = patcher
        .patch_package("vscodium", false, &data)
        .expect("warning is not fatal");

    assert_eq!(
        outcome.warnings().collect::<Vec<_>>(),
        vec!["invalid marketplace: gitea"]
    );
    assert_eq!(fixture.live_document()[DATA_FOLDER_KEY], ".vscodium-ms");
}

#[test]
fn patch_package_unknown_name_is_an_error() {
    let fixture = Fixture::new("{}", PatchConfig::default(), None);
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());

    let err = patcher
        .patch_package("codium-nightly", false, &data)
        .expect_err("unknown package must fail");
    assert_eq!(
        err.downcast_ref::<PatchError>(),
        Some(&PatchError::UnknownPackage {
            package: "codium-nightly".to_string(),
        })
    );
}

#[test]
fn patch_packages_skips_unconfigured_names() {
    let fixture = Fixture::new(
        "{}",
        PatchConfig {
            data_dir: Some(PathBuf::from(".vscodium-ms")),
            ..PatchConfig::default()
        },
        None,
    );
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());

    let outcomes = patcher
        .patch_packages(&["codium-nightly", "vscodium"], false, &data)
        .expect("batch must succeed");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].package, "vscodium");

    let all = patcher.patch_all(false, &data).expect("patch all must succeed");
    assert_eq!(all.len(), 1);
}

#[test]
fn backup_and_restore_round_trip_through_patcher() {
    let fixture = Fixture::new("{\"foo\":\"bar\"}", full_config(), None);
    let data = sample_feature_data();
    let patcher = Patcher::new(&fixture.config, fixture.store.clone());

    patcher
        .patch_package("vscodium", true, &data)
        .expect("must patch");
    assert!(fixture.live_document().get(DATA_FOLDER_KEY).is_some());

    let source = patcher
        .restore_package("vscodium", None)
        .expect("must restore");
    assert_backup_content(&source, "{\"foo\":\"bar\"}");
    assert_eq!(
        fs::read_to_string(&fixture.live).expect("must read live"),
        "{\"foo\":\"bar\"}"
    );

    assert_eq!(patcher.list_backups("vscodium").expect("must list").len(), 1);
    assert_eq!(patcher.prune_backups("vscodium", 0).expect("must prune"), 1);
    assert!(patcher.list_backups("missing").is_err());
}
