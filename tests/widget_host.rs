mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use common::{config_with, FixedCollectionSource, ScriptedRateSource};
use egi_widgets::config::{ComponentSpec, Config};
use egi_widgets::models::CurrentCollection;
use egi_widgets::widgets::{BadgeStatus, ModalKey, ModalState};
use egi_widgets::{WidgetEvent, WidgetHost};

fn collection() -> CurrentCollection {
    CurrentCollection {
        id: 12,
        name: "Giardino di Boboli".to_string(),
        can_edit: true,
        egi_count: 4,
    }
}

#[tokio::test(start_paused = true)]
async fn failing_network_halts_after_three_backoff_retries_until_currency_changes() {
    let rates = Arc::new(ScriptedRateSource::failing());
    let mut host = WidgetHost::new(
        config_with(vec![ComponentSpec::RateBadge {
            id: "header-currency-badge".to_string(),
        }]),
        rates.clone(),
        Arc::new(FixedCollectionSource(None)),
    );
    host.init().unwrap();

    let badge = host.rate_badge("header-currency-badge").unwrap();
    let halted = badge.wait_for(|view| !view.polling).await.unwrap();
    assert_eq!(halted.status, BadgeStatus::Error);
    assert_eq!(halted.text, "ERR");

    let calls = rates.calls();
    let gaps: Vec<Duration> = calls.windows(2).map(|pair| pair[1] - pair[0]).collect();
    assert_eq!(
        gaps,
        vec![Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)]
    );

    // Halted: no automatic polling, however long we wait.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(rates.calls().len(), 4);

    rates.set_fallback(Some(5.0));
    host.publish(WidgetEvent::CurrencyChanged {
        currency: "EUR".to_string(),
    });
    let live = badge.wait_for(|view| view.status == BadgeStatus::Live).await.unwrap();
    assert_eq!(live.text, "5.0000");
    assert_eq!(rates.calls().len(), 5);

    host.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn price_displays_follow_the_rate_badge() {
    let rates = Arc::new(ScriptedRateSource::new(vec![Some(4.0)], Some(5.0)));
    let mut host = WidgetHost::new(
        config_with(vec![
            ComponentSpec::PriceDisplay {
                id: "egi-card-price".to_string(),
                amount_eur: 25.0,
            },
            ComponentSpec::RateBadge {
                id: "header-currency-badge".to_string(),
            },
        ]),
        rates.clone(),
        Arc::new(FixedCollectionSource(None)),
    );
    host.init().unwrap();

    let price = host.price_display("egi-card-price").unwrap();
    let first = price.wait_for(|view| view.algo.is_some()).await.unwrap();
    assert_eq!(first.text, "100.00 ALGO");

    let second = price.wait_for(|view| view.algo == Some(125.0)).await.unwrap();
    assert_eq!(second.text, "125.00 ALGO");

    let badge = host.rate_badge("header-currency-badge").unwrap().snapshot();
    assert!(badge.animate);
    assert_eq!(badge.text, "5.0000");

    host.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn collection_badge_reacts_to_poll_and_logout() {
    let mut host = WidgetHost::new(
        config_with(vec![ComponentSpec::CollectionBadge {
            id: "header-collection-badge".to_string(),
        }]),
        Arc::new(ScriptedRateSource::failing()),
        Arc::new(FixedCollectionSource(Some(collection()))),
    );
    host.init().unwrap();

    let badge = host.collection_badge("header-collection-badge").unwrap();
    let shown = badge.wait_for(|view| view.visible).await.unwrap();
    assert_eq!(shown.link.as_deref(), Some("/collections/12/edit"));
    assert_eq!(shown.egi_count, 4);

    host.publish(WidgetEvent::UserLogout);
    let cleared = badge.wait_for(|view| !view.visible).await.unwrap();
    assert_eq!(cleared.collection_id, None);

    host.shutdown().await;
}

#[test_log::test(tokio::test)]
async fn modal_lifecycle_through_the_host() {
    let mut host = WidgetHost::new(
        config_with(vec![ComponentSpec::Modal {
            id: "create-collection-modal".to_string(),
            focusables: vec!["collection-name".to_string(), "create-submit".to_string()],
        }]),
        Arc::new(ScriptedRateSource::failing()),
        Arc::new(FixedCollectionSource(None)),
    );
    host.init().unwrap();

    assert!(host.open_modal("create-collection-modal", Some("new-collection".to_string())).unwrap());
    assert!(!host.open_modal("create-collection-modal", None).unwrap());
    assert_eq!(
        host.settle_modal("create-collection-modal").await.unwrap().as_deref(),
        Some("collection-name")
    );
    assert_eq!(host.modal("create-collection-modal").unwrap().state(), ModalState::Open);
    assert!(!host.modal("create-collection-modal").unwrap().aria_hidden());

    assert!(host.close_modal("create-collection-modal").unwrap());
    host.settle_modal("create-collection-modal").await.unwrap();
    assert!(!host.close_modal("create-collection-modal").unwrap());
    assert!(host.modal("create-collection-modal").unwrap().aria_hidden());

    assert!(!host.modal_key("create-collection-modal", ModalKey::Escape).unwrap());

    host.open_modal("create-collection-modal", Some("new-collection".to_string())).unwrap();
    host.settle_modal("create-collection-modal").await.unwrap();
    assert!(host.modal_key("create-collection-modal", ModalKey::ShiftTab).unwrap());
    assert_eq!(
        host.modal("create-collection-modal").unwrap().focused(),
        Some("create-submit")
    );
    assert!(host.modal_key("create-collection-modal", ModalKey::Escape).unwrap());
    assert_eq!(
        host.settle_modal("create-collection-modal").await.unwrap().as_deref(),
        Some("new-collection")
    );
}

#[test_log::test(tokio::test)]
async fn carousel_navigation_through_the_host() {
    let mut host = WidgetHost::new(
        config_with(vec![
            ComponentSpec::Carousel {
                id: "single".to_string(),
                item_count: 1,
                viewport_width: Some(1200.0),
                settings: Default::default(),
            },
            ComponentSpec::Carousel {
                id: "egis".to_string(),
                item_count: 10,
                viewport_width: Some(600.0),
                settings: Default::default(),
            },
        ]),
        Arc::new(ScriptedRateSource::failing()),
        Arc::new(FixedCollectionSource(None)),
    );
    host.init().unwrap();

    let single = host.carousel_mut("single").unwrap();
    single.next();
    single.prev();
    assert_eq!(single.index(), 0);
    assert!(!single.view().controls_visible);

    let egis = host.carousel_mut("egis").unwrap();
    assert_eq!(egis.items_per_page(), 2);
    egis.go_to(100);
    assert_eq!(egis.index(), 8);
    egis.resize(300.0);
    assert_eq!(egis.index(), 8);
    egis.go_to(100);
    assert_eq!(egis.index(), 9);
}

#[tokio::test]
async fn bundled_config_mounts_every_declared_component() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/widgets.toml");
    let config = assert_ok!(Config::load(&path));
    let declared: Vec<String> = config.components.iter().map(|c| c.id().to_string()).collect();

    let mut host = WidgetHost::new(
        config,
        Arc::new(ScriptedRateSource::failing()),
        Arc::new(FixedCollectionSource(None)),
    );
    assert_eq!(assert_ok!(host.init()), declared.len());
    assert_eq!(host.ids(), declared.as_slice());
    assert!(host.carousel("collectors-carousel").unwrap().has_navigation());
    assert_err!(host.init());

    host.shutdown().await;
}
