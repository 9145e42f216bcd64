//! Integration tests driving the full engine: production, purchases,
//! automation, and persistence together.

use tickmill::{
    AutoRule, CostCurve, CostRequirement, Decimal, Engine, EngineSnapshot, Modifier, Operand,
    Production, PurchaseId, QueuedAction, Repeatable, Resource, ResourceId, Upgrade,
};

/// Test the basic gameplay loop: generator purchases raise the production
/// rate through a context-driven operand (the embedder mirrors the owned
/// count into the context after each buy).
#[test]
fn test_generators_feed_production() {
    let gold = ResourceId::new("gold");
    let generator = PurchaseId::new("generator");

    let mut engine = Engine::new();
    engine.register_resource(Resource::new(gold.clone(), Decimal::from(10.0)));
    engine.register_repeatable(
        Repeatable::new(generator.clone()).with_requirement(CostRequirement::new(
            gold.clone(),
            CostCurve::Geometric {
                base: Decimal::from(10.0),
                growth: Decimal::from(2.0),
            },
        )),
    );

    // Rate = owned generators, each producing 1/sec.
    engine.register_production(Production::new(gold.clone(), Decimal::ZERO).with_modifier(
        Modifier::additive(
            "generators",
            Operand::dynamic(|view| Decimal::from(view.get::<f64>("generators").unwrap_or(0.0))),
        ),
    ));

    // No generators yet: nothing accrues.
    engine.advance(5.0).unwrap();
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0));

    assert!(engine.buy(&generator).unwrap());
    let owned = engine.repeatable(&generator).unwrap().amount();
    assert_eq!(owned, Decimal::ONE);
    engine.context_mut().set("generators", owned.to_f64());

    // One generator now drips 1/sec.
    engine.advance(5.0).unwrap();
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(5.0));
}

/// Test that an offline catch-up lump advance credits the same amount as
/// live ticking when no purchases intervene.
#[test]
fn test_offline_catch_up_is_lossless() {
    let build = || {
        let gold = ResourceId::new("gold");
        let mut engine = Engine::new();
        engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
        engine.register_production(
            Production::new(gold.clone(), Decimal::from(7.0))
                .with_modifier(Modifier::multiplicative("boost", Decimal::from(1.5))),
        );
        (gold, engine)
    };

    let (gold, mut live) = build();
    // 3600 one-second ticks.
    for _ in 0..3600 {
        live.advance(1.0).unwrap();
    }

    let (_, mut offline) = build();
    offline.advance(3600.0).unwrap();

    assert!(live
        .ledger()
        .amount(&gold)
        .approx_eq(offline.ledger().amount(&gold), 1e-9));
    assert!(offline
        .ledger()
        .amount(&gold)
        .approx_eq(Decimal::from(37_800.0), 1e-9));
}

/// Test a production pipeline reading an upstream resource within the same
/// tick, with the order declared rather than inferred.
#[test]
fn test_two_stage_pipeline() {
    let ore = ResourceId::new("ore");
    let ingots = ResourceId::new("ingots");

    let mut engine = Engine::new();
    engine.register_resource(Resource::new(ore.clone(), Decimal::ZERO));
    engine.register_resource(Resource::new(ingots.clone(), Decimal::ZERO));

    // Ingots smelt at a tenth of the current ore stock per second.
    let ore_ref = ore.clone();
    engine.register_production(
        Production::new(
            ingots.clone(),
            Operand::dynamic(move |view| view.amount(&ore_ref) / Decimal::from(10.0)),
        )
        .reads(ore.clone()),
    );
    engine.register_production(Production::new(ore.clone(), Decimal::from(100.0)));

    engine.advance(1.0).unwrap();

    // Ore produced first (100), so the smelter saw the fresh stock.
    assert_eq!(engine.ledger().amount(&ore), Decimal::from(100.0));
    assert_eq!(engine.ledger().amount(&ingots), Decimal::from(10.0));
}

/// Test that automation combined with an unlocking upgrade drives the
/// economy without manual buys.
#[test]
fn test_automated_economy() {
    let gold = ResourceId::new("gold");
    let miner = PurchaseId::new("miner");
    let automation = PurchaseId::new("automation");

    let mut engine = Engine::new();
    engine.register_resource(Resource::new(gold.clone(), Decimal::from(20.0)));
    engine.register_production(Production::new(gold.clone(), Decimal::from(10.0)));
    engine.register_repeatable(
        Repeatable::new(miner.clone()).with_requirement(CostRequirement::new(
            gold.clone(),
            CostCurve::Constant(Decimal::from(15.0)),
        )),
    );
    engine.register_upgrade(
        Upgrade::new(automation.clone()).with_requirement(CostRequirement::new(
            gold.clone(),
            CostCurve::Constant(Decimal::from(20.0)),
        )),
    );
    engine.register_auto_rule(AutoRule::new(automation.clone()));
    engine.register_auto_rule(AutoRule::new(miner.clone()));

    // Tick 1: rules run after production. Gold 20 + 10 = 30; the upgrade
    // buys for 20, then the miner buys for 15... but only 10 remains, so
    // the miner waits.
    engine.advance(1.0).unwrap();
    assert!(engine.upgrade(&automation).unwrap().is_bought());
    assert_eq!(engine.repeatable(&miner).unwrap().amount(), Decimal::ZERO);
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0));

    // Tick 2: 10 + 10 = 20, miner buys for 15.
    engine.advance(1.0).unwrap();
    assert_eq!(engine.repeatable(&miner).unwrap().amount(), Decimal::ONE);
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(5.0));
}

/// Test a timed research queue: the action fires on the tick its condition
/// first holds and never again.
#[test]
fn test_research_completes_once() {
    let science = ResourceId::new("science");
    let tech = ResourceId::new("tech");

    let mut engine = Engine::new();
    engine.register_resource(Resource::new(science.clone(), Decimal::ZERO));
    engine.register_resource(Resource::new(tech.clone(), Decimal::ZERO));
    engine.register_production(Production::new(science.clone(), Decimal::from(2.0)));

    let science_ref = science.clone();
    let tech_ref = tech.clone();
    engine.queue_action(QueuedAction::new(
        "alchemy",
        move |view| view.amount(&science_ref) >= Decimal::from(10.0),
        move |ledger| {
            if let Ok(t) = ledger.get_mut(&tech_ref) {
                t.deposit(Decimal::ONE);
            }
        },
    ));

    engine.advance(4.0).unwrap(); // science = 8, not done
    assert_eq!(engine.ledger().amount(&tech), Decimal::ZERO);

    engine.advance(1.0).unwrap(); // science = 10, fires
    assert_eq!(engine.ledger().amount(&tech), Decimal::ONE);

    engine.advance(10.0).unwrap(); // long past the threshold, no re-fire
    assert_eq!(engine.ledger().amount(&tech), Decimal::ONE);
}

/// Test the swap-state mechanic: checkpoint, play an alternate timeline,
/// restore, and confirm best/total survive while balances roll back.
#[test]
fn test_swap_state_checkpoint() {
    let gold = ResourceId::new("gold");
    let mut engine = Engine::new();
    engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
    engine.register_production(Production::new(gold.clone(), Decimal::ONE));
    engine.context_mut().set("timeline", "main");

    engine.advance(10.0).unwrap();
    let checkpoint = engine.snapshot();

    engine.context_mut().set("timeline", "alternate");
    engine.advance(90.0).unwrap();
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(100.0));

    engine.restore(&checkpoint);
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0));
    assert_eq!(
        engine.context().get::<String>("timeline"),
        Some("main".to_string())
    );

    // The rolled-back timeline still remembers its high-water mark through
    // the restored state.
    let resource = engine.ledger().get(&gold).unwrap();
    assert_eq!(resource.best(), Decimal::from(10.0));
}

/// Test that a snapshot survives a JSON round trip and restores into a
/// freshly configured engine.
#[test]
fn test_save_load_round_trip() {
    let gold = ResourceId::new("gold");
    let miner = PurchaseId::new("miner");

    let build = || {
        let mut engine = Engine::new();
        engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
        engine.register_production(Production::new(gold.clone(), Decimal::from(5.0)));
        engine.register_repeatable(
            Repeatable::new(miner.clone()).with_requirement(CostRequirement::new(
                gold.clone(),
                CostCurve::Geometric {
                    base: Decimal::ONE,
                    growth: Decimal::from(2.0),
                },
            )),
        );
        engine
    };

    let mut engine = build();
    engine.advance(20.0).unwrap();
    engine.buy_max(&miner).unwrap();
    engine.context_mut().set("prestige_level", 2);

    let json = serde_json::to_string(&engine.snapshot()).unwrap();

    // Simulate a fresh process: same configuration, restored state.
    let mut loaded = build();
    let snapshot: EngineSnapshot = serde_json::from_str(&json).unwrap();
    loaded.restore(&snapshot);

    assert_eq!(
        loaded.ledger().amount(&gold),
        engine.ledger().amount(&gold)
    );
    assert_eq!(
        loaded.repeatable(&miner).unwrap().amount(),
        engine.repeatable(&miner).unwrap().amount()
    );
    assert_eq!(loaded.context().get::<i32>("prestige_level"), Some(2));
}

/// Test the rate breakdown surface used by UI tooltips.
#[test]
fn test_rate_breakdown_surface() {
    let gold = ResourceId::new("gold");
    let mut engine = Engine::new();
    engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
    engine.register_production(
        Production::new(gold.clone(), Decimal::from(2.0))
            .with_modifier(Modifier::multiplicative("generators", Decimal::from(3.0)))
            .with_modifier(Modifier::additive("drip", Decimal::from(4.0))),
    );

    assert_eq!(engine.rate_of(&gold), Some(Decimal::from(10.0)));

    let breakdown = engine.breakdown_of(&gold).unwrap();
    assert_eq!(breakdown.base, Decimal::from(2.0));
    assert_eq!(breakdown.value, Decimal::from(10.0));
    assert_eq!(breakdown.steps.len(), 2);
    assert_eq!(breakdown.steps[0].0, "generators");
}

/// Test that a respec (prestige) zeroes purchases while keeping lifetime
/// stats, then the economy rebuilds from scratch.
#[test]
fn test_prestige_reset_cycle() {
    let gold = ResourceId::new("gold");
    let miner = PurchaseId::new("miner");

    let mut engine = Engine::new();
    engine.register_resource(Resource::new(gold.clone(), Decimal::ZERO));
    engine.register_production(Production::new(gold.clone(), Decimal::from(10.0)));
    engine.register_repeatable(
        Repeatable::new(miner.clone()).with_requirement(CostRequirement::new(
            gold.clone(),
            CostCurve::Constant(Decimal::from(5.0)),
        )),
    );

    engine.advance(10.0).unwrap();
    engine.buy(&miner).unwrap();

    // Prestige: zero the balance and the purchases, keep lifetime stats.
    engine
        .ledger_mut()
        .get_mut(&gold)
        .unwrap()
        .reset_to(Decimal::ZERO);

    let resource = engine.ledger().get(&gold).unwrap();
    assert_eq!(resource.amount(), Decimal::ZERO);
    assert_eq!(resource.best(), Decimal::from(100.0));
    assert_eq!(resource.total(), Decimal::from(100.0));

    // Production resumes immediately.
    engine.advance(1.0).unwrap();
    assert_eq!(engine.ledger().amount(&gold), Decimal::from(10.0));
}
