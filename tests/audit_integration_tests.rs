//! End-to-end audit runs against files in a temporary directory.
//!
//! Database-backed sources use an in-memory SQLite database.

use serde_json::json;
use shop_config_audit::audit::{run_audit, run_bootstrap};
use shop_config_audit::collect::BootstrapOutcome;
use shop_config_audit::config::{Config, OtherSetting, TemplateBinding};
use shop_config_audit::db::Database;
use shop_config_audit::db::records::{InstanceKind, NewInstance, RecordField};
use shop_config_audit::error::ErrorCode;
use shop_config_audit::report::WarningKind;
use shop_config_audit::types::{Classification, Provenance};
use std::path::PathBuf;
use tempfile::TempDir;

const DEFINITIONS: &str = "\
Order:
  modifiers: Modifier classes applied to every order. See {{Order.minimum}}.
  minimum: Minimum order amount.
Cart:
  enabled: Whether the cart is shown. See {{Cart.missing}}.
Order_Email:
  css_file_location: Stylesheet used for order emails.
";

const BASELINE: &str = "\
Order:
  modifiers: []
  minimum: 0
Cart:
  enabled: true
Order_Email:
  css_file_location: shop/css/OrderReport.css
";

const EXTRA: &str = "\
Order:
  modifiers: [TaxModifier]
Cart:
  extra: x
Legacy:
  old_flag: 1
";

/// Lay out a store in a temp dir and return a config pointing at it.
fn setup_store() -> (TempDir, Config) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    std::fs::create_dir_all(root.join("shop/css")).unwrap();
    std::fs::write(root.join("definitions.yaml"), DEFINITIONS).unwrap();
    std::fs::write(root.join("shop.yaml"), BASELINE).unwrap();
    std::fs::write(root.join("extra.yaml"), EXTRA).unwrap();
    std::fs::write(root.join("shop/css/OrderReport.css"), "body {}").unwrap();

    let mut config = Config::default();
    config.paths.base_dir = root.to_path_buf();
    config.paths.definitions = PathBuf::from("definitions.yaml");
    config.paths.baseline = PathBuf::from("shop.yaml");
    config.paths.local_config = PathBuf::from("mysite/_config/shop.yaml");
    config.paths.config_files = vec![PathBuf::from("extra.yaml")];
    config.other_settings = vec![OtherSetting {
        namespace: "SiteConfig".to_string(),
        field: "website_title".to_string(),
        description: "The name of the website.".to_string(),
        value: Some(json!("Corner Shop")),
        env: None,
    }];
    config
        .types
        .implementations
        .insert("OrderModifier".to_string(), vec!["TaxModifier".to_string()]);
    (temp, config)
}

fn seed_store_record(db: &Database) {
    db.save_store_record(
        "EcommerceDBConfig",
        1,
        true,
        &[
            RecordField::new("Title", "Title", json!("Default")),
            RecordField::new("ShopClosed", "Shop Closed", json!(false)).with_default(json!(0)),
            RecordField::new("ProductsPerPage", "Products per page", json!(24)),
        ],
    )
    .expect("Failed to seed store record");
}

mod file_sources {
    use super::*;

    #[test]
    fn classifies_every_key() {
        let (_temp, config) = setup_store();
        let report = run_audit(&config, None).expect("Audit failed");

        let labels: Vec<(String, Classification)> = report
            .entries
            .iter()
            .map(|e| (e.label(), e.classification))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("Order.modifiers".to_string(), Classification::Customized),
                ("Order.minimum".to_string(), Classification::MatchesDefault),
                ("Cart.enabled".to_string(), Classification::MatchesDefault),
                ("Cart.extra".to_string(), Classification::Undocumented),
                (
                    "Order_Email.css_file_location".to_string(),
                    Classification::MatchesDefault
                ),
                ("Legacy".to_string(), Classification::OrphanedInConfig),
                ("SiteConfig.website_title".to_string(), Classification::Customized),
            ]
        );
    }

    #[test]
    fn records_provenance() {
        let (_temp, config) = setup_store();
        let report = run_audit(&config, None).unwrap();

        let modifiers = &report.entries[0];
        assert_eq!(modifiers.provenance, Provenance::StaticOverride);
        assert_eq!(modifiers.live.raw, json!(["TaxModifier"]));
        let site = report.entries.last().unwrap();
        assert_eq!(site.provenance, Provenance::Other);
        assert_eq!(site.default.as_ref().unwrap().raw, json!("[no default set]"));
    }

    #[test]
    fn runs_builtin_validators() {
        let (_temp, config) = setup_store();
        let report = run_audit(&config, None).unwrap();

        assert_eq!(
            report.entries[0].special_check.as_deref(),
            Some("Available implementations of OrderModifier: TaxModifier")
        );
        assert_eq!(
            report.entries[4].special_check.as_deref(),
            Some("ADDITIONAL CHECK: file exists.")
        );
    }

    #[test]
    fn reports_consistency_warnings() {
        let (_temp, config) = setup_store();
        let report = run_audit(&config, None).unwrap();

        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                WarningKind::BootstrapCreated,
                WarningKind::UndocumentedKey,
                WarningKind::OrphanedNamespace,
                WarningKind::DanglingReference,
            ]
        );
        assert!(report.warnings[3].message.contains("Cart.missing"));
    }

    #[test]
    fn empty_namespace_is_orphaned() {
        for content in ["Retired: {}\n", "Retired:\n"] {
            let (temp, mut config) = setup_store();
            std::fs::write(temp.path().join("retired.yaml"), content).unwrap();
            config.paths.config_files.push(PathBuf::from("retired.yaml"));

            let report = run_audit(&config, None).unwrap();
            let retired = report
                .entries
                .iter()
                .find(|e| e.label() == "Retired")
                .unwrap_or_else(|| panic!("no entry for {:?}", content));
            assert_eq!(retired.classification, Classification::OrphanedInConfig);
            assert!(retired.orphaned_fields.is_empty());
            assert_eq!(
                report
                    .warnings
                    .iter()
                    .filter(|w| w.kind == WarningKind::OrphanedNamespace)
                    .count(),
                2
            );
        }
    }

    #[test]
    fn template_bindings_are_computed() {
        let (_temp, mut config) = setup_store();
        config.template_bindings.insert(
            "TableTotalClassName".to_string(),
            TemplateBinding {
                description: "class of the order total".to_string(),
                pattern: "{class_name}_total".to_string(),
            },
        );
        config.template_bindings.insert(
            "TableSubTotalID".to_string(),
            TemplateBinding {
                description: "id of the sub total".to_string(),
                pattern: "Table_{id}".to_string(),
            },
        );

        let report = run_audit(&config, None).unwrap();
        let bindings: Vec<_> = report
            .entries
            .iter()
            .filter(|e| e.namespace == "Templates")
            .collect();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].label(), "Templates.AJAXDefinitions_TableTotalClassName");
        assert_eq!(bindings[0].live.raw, json!("[CLASSNAME]_total"));
        assert_eq!(bindings[1].label(), "Templates.AJAXDefinitions_TableSubTotalID");
        assert_eq!(bindings[1].live.raw, json!("Table_[ID]"));
        for binding in &bindings {
            assert_eq!(binding.classification, Classification::Customized);
            assert_eq!(binding.provenance, Provenance::Computed);
            assert_eq!(binding.default.as_ref().unwrap().raw, json!(""));
        }
        assert!(bindings[0]
            .description
            .as_deref()
            .unwrap()
            .contains("classname=\"$AJAXDefinitions.TableTotalClassName\""));
    }

    #[test]
    fn bootstrap_happens_once() {
        let (temp, config) = setup_store();
        let first = run_audit(&config, None).unwrap();
        assert!(first.bootstrap.as_ref().unwrap().created());

        let local = temp.path().join("mysite/_config/shop.yaml");
        std::fs::write(&local, "Order:\n  minimum: 10\n").unwrap();

        let second = run_audit(&config, None).unwrap();
        assert!(!second.bootstrap.as_ref().unwrap().created());
        assert_eq!(std::fs::read_to_string(&local).unwrap(), "Order:\n  minimum: 10\n");
        let minimum = second
            .entries
            .iter()
            .find(|e| e.label() == "Order.minimum")
            .unwrap();
        assert_eq!(minimum.classification, Classification::Customized);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let (_temp, config) = setup_store();
        run_bootstrap(&config).unwrap();
        let a = run_audit(&config, None).unwrap();
        let b = run_audit(&config, None).unwrap();
        assert_eq!(a.entries, b.entries);
        assert_eq!(a.warnings, b.warnings);
    }

    #[test]
    fn init_only_bootstraps() {
        let (temp, config) = setup_store();
        let outcome = run_bootstrap(&config).unwrap();
        assert!(matches!(outcome, BootstrapOutcome::Created { .. }));
        assert_eq!(
            std::fs::read_to_string(temp.path().join("mysite/_config/shop.yaml")).unwrap(),
            BASELINE
        );
    }
}

mod failures {
    use super::*;

    #[test]
    fn missing_definitions_names_the_file() {
        let (temp, config) = setup_store();
        std::fs::remove_file(temp.path().join("definitions.yaml")).unwrap();

        let err = run_audit(&config, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert!(err.resource.unwrap().ends_with("definitions.yaml"));
    }

    #[test]
    fn missing_extra_file_is_fatal() {
        let (temp, config) = setup_store();
        std::fs::remove_file(temp.path().join("extra.yaml")).unwrap();

        let err = run_audit(&config, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert!(err.resource.unwrap().ends_with("extra.yaml"));
    }

    #[test]
    fn scalar_namespace_is_invalid_shape() {
        let (temp, config) = setup_store();
        std::fs::write(temp.path().join("extra.yaml"), "Order: broken\n").unwrap();

        let err = run_audit(&config, None).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfigShape);
        assert_eq!(err.resource.as_deref(), Some("Order"));
    }

    #[test]
    fn missing_css_file_is_flagged_not_fatal() {
        let (temp, config) = setup_store();
        std::fs::remove_file(temp.path().join("shop/css/OrderReport.css")).unwrap();

        let report = run_audit(&config, None).unwrap();
        let css = report
            .entries
            .iter()
            .find(|e| e.namespace == "Order_Email")
            .unwrap();
        assert!(css
            .special_check
            .as_deref()
            .unwrap()
            .starts_with("ADDITIONAL CHECK: this file does not exist!"));
    }
}

mod database_sources {
    use super::*;

    #[test]
    fn store_records_become_a_namespace() {
        let (_temp, config) = setup_store();
        let db = Database::open_in_memory().unwrap();
        seed_store_record(&db);

        let report = run_audit(&config, Some(db)).unwrap();
        let store: Vec<_> = report
            .entries
            .iter()
            .filter(|e| e.namespace == "EcommerceDBConfig")
            .collect();
        assert_eq!(store.len(), 2);
        assert_eq!(store[0].field.as_deref(), Some("ShopClosed"));
        assert_eq!(store[0].classification, Classification::MatchesDefault);
        assert_eq!(store[0].provenance, Provenance::Database);
        assert_eq!(store[1].classification, Classification::Customized);
        assert!(store[1]
            .description
            .as_deref()
            .unwrap()
            .starts_with("Products per page."));
    }

    #[test]
    fn missing_store_record_is_fatal() {
        let (_temp, config) = setup_store();
        let db = Database::open_in_memory().unwrap();

        let err = run_audit(&config, Some(db)).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert_eq!(err.resource.as_deref(), Some("EcommerceDBConfig"));
    }

    #[test]
    fn missing_required_pages_are_listed() {
        let (_temp, config) = setup_store();
        let db = Database::open_in_memory().unwrap();
        seed_store_record(&db);

        let report = run_audit(&config, Some(db)).unwrap();
        let pages: Vec<String> = report
            .entries
            .iter()
            .filter(|e| e.namespace == "Pages")
            .map(|e| e.label())
            .collect();
        assert_eq!(
            pages,
            vec![
                "Pages.CheckoutPage",
                "Pages.OrderConfirmationPage",
                "Pages.AccountPage"
            ]
        );
        assert!(report
            .entries
            .iter()
            .filter(|e| e.namespace == "Pages")
            .all(|e| e.live.raw == json!("[not created]")));
    }

    #[test]
    fn checkout_steps_without_checkout_page_fail() {
        let (_temp, config) = setup_store();
        let db = Database::open_in_memory().unwrap();
        seed_store_record(&db);
        db.insert_instance(
            InstanceKind::CheckoutStep,
            &NewInstance {
                class_name: "CheckoutPage_StepDescription".to_string(),
                code: "ORDERITEMS".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        let err = run_audit(&config, Some(db)).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert_eq!(err.resource.as_deref(), Some("CheckoutPage"));
    }

    #[test]
    fn order_steps_are_keyed_by_code() {
        let (_temp, config) = setup_store();
        let db = Database::open_in_memory().unwrap();
        seed_store_record(&db);
        db.insert_instance(
            InstanceKind::OrderStep,
            &NewInstance {
                class_name: "OrderStep_Created".to_string(),
                code: "CREATED".to_string(),
                description: "Order has been created.".to_string(),
                class_fields: json!({"ShowAsUncompletedOrder": "Boolean"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                declared_defaults: json!({"ShowAsUncompletedOrder": 1})
                    .as_object()
                    .cloned()
                    .unwrap(),
                values: json!({"ShowAsUncompletedOrder": true})
                    .as_object()
                    .cloned()
                    .unwrap(),
                ..Default::default()
            },
        )
        .unwrap();

        let report = run_audit(&config, Some(db)).unwrap();
        let step = report
            .entries
            .iter()
            .find(|e| e.label() == "OrderStep.CREATED")
            .expect("order step entry");
        assert_eq!(step.provenance, Provenance::Database);
        assert_eq!(step.live.raw, json!({"ShowAsUncompletedOrder": true}));
        // Structured values compare as canonical JSON, so `true` and `1` differ here.
        assert_eq!(step.classification, Classification::Customized);
    }
}
