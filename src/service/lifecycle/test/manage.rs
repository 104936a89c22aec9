use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use sea_orm::DbErr;
use serde_json::json;
use test_utils::factory::{self, helpers::expires_in_days};

use crate::{
    error::lifecycle::LifecycleError,
    model::{
        bot::{BotFamily, ConnectionStatus, EditBotParams, LifecycleState},
        user::Requester,
    },
};

use super::Harness;

fn manager_snapshot_with_channels(quantity: u32) -> serde_json::Value {
    json!({
        "amount": 3000,
        "days": 30,
        "permissions": {
            "channels": { "unit_price": 90, "quantity": quantity, "multi": true }
        }
    })
}

/// Tests suspending a connected bot.
///
/// Expected: remote disconnect, stored suspended and offline; suspending again is a
/// no-op
#[tokio::test]
async fn suspend_disconnects_and_stores_both_axes() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let (bot, fake) = harness.manager_bot(&user.username).await?;
    let service = harness.service(BotFamily::ManagerBot);
    let admin = Requester::admin("root");

    service.connect(&admin, bot.id).await.unwrap();
    let suspended = service.suspend(&admin, bot.id).await.unwrap();
    let again = service.suspend(&admin, bot.id).await.unwrap();

    assert_eq!(suspended.lifecycle_state, LifecycleState::Suspended);
    assert_eq!(suspended.connection_status, ConnectionStatus::Offline);
    assert_eq!(again, harness.bot(bot.id).await.unwrap());
    assert_eq!(fake.call_count("disconnectBot"), 1);
    assert_eq!(
        fake.status_of(&bot.template_name),
        Some(ConnectionStatus::Offline)
    );

    Ok(())
}

/// Tests suspending while the panel is down.
///
/// Expected: suspension is stored anyway
#[tokio::test]
async fn suspend_survives_unreachable_panel() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let (bot, fake) = harness.manager_bot(&user.username).await?;
    fake.set_unreachable(true);

    let suspended = harness
        .service(BotFamily::ManagerBot)
        .suspend(&Requester::admin("root"), bot.id)
        .await
        .unwrap();

    assert!(suspended.is_suspended());
    assert!(harness.bot(bot.id).await.unwrap().is_suspended());

    Ok(())
}

/// Tests activating suspended bots.
///
/// Expected: expired bots refused with EXPIRED; others active and offline
#[tokio::test]
async fn activate_refuses_expired_bots() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let expired = factory::bot::BotFactory::new(harness.db(), &user.username, "audio_bot")
        .lifecycle_state("suspended")
        .expires_at(Some(Utc::now() - Duration::days(1)))
        .build()
        .await?;
    let current = factory::bot::BotFactory::new(harness.db(), &user.username, "audio_bot")
        .lifecycle_state("suspended")
        .build()
        .await?;
    let service = harness.service(BotFamily::AudioBot);
    let requester = Requester::reseller(&user.username);

    let err = service.activate(&requester, expired.id).await.unwrap_err();
    let activated = service.activate(&requester, current.id).await.unwrap();

    assert!(matches!(err, LifecycleError::Expired(_)));
    assert_eq!(activated.lifecycle_state, LifecycleState::Active);
    assert_eq!(
        harness.bot(current.id).await.unwrap().lifecycle_state,
        LifecycleState::Active
    );

    Ok(())
}

/// Tests buying two more cycles.
///
/// Expected: two cycle prices debited, expiry moved 60 days from the old expiry
#[tokio::test]
async fn extend_moves_expiry_from_current_expiry() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let bot = factory::create_bot(harness.db(), &user.username, "audio_bot", None).await?;

    let extended = harness
        .service(BotFamily::AudioBot)
        .extend(&Requester::reseller(&user.username), bot.id, 2)
        .await
        .unwrap();

    assert_eq!(
        extended.expires_at.unwrap(),
        bot.expires_at.unwrap() + Duration::days(60)
    );
    assert_eq!(harness.balance(&user.username).await, user.balance - 6000);
    assert_eq!(
        harness.bot(bot.id).await.unwrap().expires_at,
        extended.expires_at
    );

    Ok(())
}

/// Tests extending an already expired bot.
///
/// Expected: the new expiry counts from now
#[tokio::test]
async fn extend_expired_bot_counts_from_now() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let bot = factory::bot::BotFactory::new(harness.db(), &user.username, "audio_bot")
        .expires_at(Some(Utc::now() - Duration::days(5)))
        .build()
        .await?;

    let extended = harness
        .service(BotFamily::AudioBot)
        .extend(&Requester::reseller(&user.username), bot.id, 1)
        .await
        .unwrap();

    let days_left = (extended.expires_at.unwrap() - Utc::now()).num_days();
    assert_eq!(days_left, 29);

    Ok(())
}

/// Tests invalid extensions.
///
/// Expected: BAD_REQUEST for zero cycles and unlimited bots, INSUFFICIENT_BALANCE when
/// the owner cannot pay, nothing written in any case
#[tokio::test]
async fn extend_rejections() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::user::UserFactory::new(harness.db())
        .balance(1000)
        .build()
        .await?;
    let limited = factory::create_bot(harness.db(), &user.username, "audio_bot", None).await?;
    let unlimited = factory::bot::BotFactory::new(harness.db(), &user.username, "audio_bot")
        .expires_at(None)
        .billing_snapshot(factory::helpers::package_snapshot(3000, None))
        .build()
        .await?;
    let service = harness.service(BotFamily::AudioBot);
    let requester = Requester::reseller(&user.username);

    let zero = service.extend(&requester, limited.id, 0).await.unwrap_err();
    let forever = service.extend(&requester, unlimited.id, 1).await.unwrap_err();
    let broke = service.extend(&requester, limited.id, 1).await.unwrap_err();

    assert_eq!(zero.code(), "BAD_REQUEST");
    assert_eq!(forever.code(), "BAD_REQUEST");
    assert_eq!(broke.code(), "INSUFFICIENT_BALANCE");
    assert_eq!(harness.balance(&user.username).await, 1000);
    assert_eq!(
        harness.bot(limited.id).await.unwrap().expires_at,
        limited.expires_at
    );

    Ok(())
}

/// Tests a cycle count whose expiry falls outside the representable date range.
///
/// Expected: BAD_REQUEST instead of a panic, balance and expiry untouched
#[tokio::test]
async fn extend_rejects_out_of_range_cycle_counts() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::user::UserFactory::new(harness.db())
        .balance(5000)
        .build()
        .await?;
    let bot = factory::create_bot(harness.db(), &user.username, "audio_bot", None).await?;

    let err = harness
        .service(BotFamily::AudioBot)
        .extend(&Requester::reseller(&user.username), bot.id, 10_000_000)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "BAD_REQUEST");
    assert_eq!(harness.balance(&user.username).await, 5000);
    assert_eq!(harness.bot(bot.id).await.unwrap().expires_at, bot.expires_at);

    Ok(())
}

/// Tests adding manager bot permissions mid-cycle.
///
/// Expected: 10 days left charges 3 added channel units at 90/30 per day (90) plus a
/// new 300 permission (100); the bot is replaced on its panel and reconnected
#[tokio::test]
async fn edit_charges_added_permissions_and_redeploys() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    factory::create_permission_price(harness.db(), "channels", 50, true).await?;
    factory::create_permission_price(harness.db(), "music", 300, false).await?;
    let (panel, fake) = harness.manager_panel().await?;
    let bot = factory::bot::BotFactory::new(harness.db(), &user.username, "manager_bot")
        .panel_id(Some(panel.id))
        .connection_status("online")
        .expires_at(Some(expires_in_days(10)))
        .billing_snapshot(manager_snapshot_with_channels(2))
        .build()
        .await?;
    fake.insert(&bot.template_name, ConnectionStatus::Online);

    let edited = harness
        .service(BotFamily::ManagerBot)
        .edit(
            &Requester::reseller(&user.username),
            bot.id,
            EditBotParams {
                template: Some(json!({ "nickname": "Lobby" })),
                permissions: Some(BTreeMap::from([
                    ("channels".to_string(), 5),
                    ("music".to_string(), 1),
                ])),
            },
        )
        .await
        .unwrap();

    assert_eq!(harness.balance(&user.username).await, user.balance - 190);
    // Held grants keep the price they were bought at.
    assert_eq!(edited.billing.permissions["channels"].unit_price, 90);
    assert_eq!(edited.billing.permissions["channels"].quantity, 5);
    assert_eq!(edited.connection_status, ConnectionStatus::Online);
    assert_eq!(fake.call_count("deleteBot"), 1);
    assert_eq!(fake.call_count("createBot"), 1);
    assert_eq!(
        fake.status_of(&bot.template_name),
        Some(ConnectionStatus::Online)
    );
    let stored = harness.bot(bot.id).await.unwrap();
    assert_eq!(stored.template, json!({ "nickname": "Lobby" }));
    assert_eq!(stored.billing, edited.billing);

    Ok(())
}

/// Tests editing a suspended bot.
///
/// Expected: change stored, panel untouched, bot stays offline
#[tokio::test]
async fn edit_suspended_bot_stays_local() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let (panel, fake) = harness.manager_panel().await?;
    let bot = factory::bot::BotFactory::new(harness.db(), &user.username, "manager_bot")
        .panel_id(Some(panel.id))
        .lifecycle_state("suspended")
        .build()
        .await?;

    let edited = harness
        .service(BotFamily::ManagerBot)
        .edit(
            &Requester::reseller(&user.username),
            bot.id,
            EditBotParams {
                template: Some(json!({ "nickname": "Quiet" })),
                permissions: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.connection_status, ConnectionStatus::Offline);
    assert!(fake.calls().is_empty());
    assert_eq!(
        harness.bot(bot.id).await.unwrap().template,
        json!({ "nickname": "Quiet" })
    );

    Ok(())
}

/// Tests the renewal used by the expiration job.
///
/// Expected: one cycle debited and the expiry moved one cycle from the old expiry
#[tokio::test]
async fn renew_bot_advances_one_cycle() -> Result<(), DbErr> {
    let harness = Harness::new().await;
    let user = factory::create_user(harness.db()).await?;
    let bot = factory::bot::BotFactory::new(harness.db(), &user.username, "audio_bot")
        .expires_at(Some(Utc::now() - Duration::hours(2)))
        .autorenew(true)
        .build()
        .await?;
    let service = harness.service(BotFamily::AudioBot);
    let stored = harness.bot(bot.id).await.unwrap();

    let renewed = service.renew_bot(&stored).await.unwrap();

    assert!(stored.expires_at.unwrap() < Utc::now());
    assert_eq!(
        renewed.expires_at,
        Some(stored.expires_at.unwrap() + Duration::days(30))
    );
    assert_eq!(renewed.lifecycle_state, LifecycleState::Active);
    assert_eq!(harness.balance(&user.username).await, user.balance - 3000);

    Ok(())
}
