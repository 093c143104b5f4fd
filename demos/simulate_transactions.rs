//! Transaction simulation demo
//!
//! Walks through what the dashboard does: seed a shopper's history, submit a
//! legitimate purchase and a gift-card attack, report the attack as fraud and
//! show how the learned weights and dashboard stats change.
//!
//! Run with `RUST_LOG=debug` to see the engine's log output.

use chrono::Utc;
use fraudguard_engine::synthetic::{DemoUser, SyntheticGenerator};
use fraudguard_engine::{
    EngineConfig, JsonFileStore, RiskEngine, TransactionRequest, WeightStore,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== FraudGuard Risk Engine ===\n");

    let store: Arc<dyn WeightStore> = Arc::new(JsonFileStore::new(
        std::env::temp_dir().join("fraudguard").join("weights.json"),
    ));
    let engine = RiskEngine::with_store(EngineConfig::default(), store)?;

    // 1. Learn what normal looks like
    println!("1. Seeding Shopper Profiles");
    let mut generator = SyntheticGenerator::new(2024, Utc::now());
    for user in DemoUser::ALL {
        let history = generator.history(user, 30, 0.0);
        let learned = engine.seed_history(&history);
        println!("   {}: {} transactions", user.user_id(), learned);
    }
    println!();

    // 2. Legitimate purchase
    println!("2. Legitimate Purchase");
    let legit = engine.submit(TransactionRequest {
        user_id: "sarah123".to_string(),
        amount: 85.0,
        device: "iPhone".to_string(),
        typing_speed: 80,
        timestamp: Utc::now().date_naive().and_hms_opt(14, 0, 0).map(|t| t.and_utc()).unwrap_or_else(Utc::now),
        merchant: Some("Starbucks".to_string()),
    })?;
    println!("   Risk Score: {}/100", legit.risk_score);
    println!("   Status: {} ({})", legit.status, legit.color);
    println!("   Reasons: {:?}", legit.reasons);
    println!();

    // 3. Gift-card attack at 3 AM
    println!("3. Gift Card Attack");
    let attack = engine.submit(TransactionRequest {
        user_id: "sarah123".to_string(),
        amount: 500.0,
        device: "Unknown_Device".to_string(),
        typing_speed: 250,
        timestamp: Utc::now().date_naive().and_hms_opt(3, 0, 0).map(|t| t.and_utc()).unwrap_or_else(Utc::now),
        merchant: Some("GiftCardMall".to_string()),
    })?;
    println!("   Risk Score: {}/100", attack.risk_score);
    println!("   Status: {} ({})", attack.status, attack.color);
    for reason in &attack.reasons {
        println!("     - {}", reason);
    }
    println!();

    // 4. Background traffic
    println!("4. Background Traffic");
    for i in 0..20 {
        let user = DemoUser::ALL[i % DemoUser::ALL.len()];
        let tx = if i % 7 == 0 {
            generator.fraudulent(user)
        } else {
            generator.legitimate(user, 0)
        };
        engine.submit(tx)?;
    }
    for row in engine.recent_transactions(5) {
        println!(
            "   {:<14} ${:>8.2}  score {:>3}  {}",
            row.merchant, row.amount, row.risk_score, row.status
        );
    }
    println!();

    // 5. Fraud report feedback
    println!("5. Reporting the Attack as Fraud");
    let before = engine.weights();
    engine.report_fraud(attack.transaction_id)?;
    let after = engine.weights();
    for (feature, weight) in after.as_map() {
        println!("   {:<18} {:>5.1} -> {:>5.1}", feature, before.get(*feature), weight);
    }
    println!();

    // 6. Dashboard stats
    println!("6. Dashboard Stats");
    let stats = engine.stats();
    println!("   Transactions Today: {}", stats.today_count);
    println!("   Blocked: {}", stats.blocked_count);
    println!("   Average Score: {:.1}", stats.average_score);
    println!();

    println!("Model info: {}", serde_json::to_string_pretty(&engine.model_info())?);

    Ok(())
}
