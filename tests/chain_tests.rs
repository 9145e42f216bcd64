//! Integration tests for modifier chains: ordering, toggling, inversion.

use proptest::prelude::*;
use tickmill::{Decimal, EngineContext, EngineError, EvalContext, Modifier, ModifierChain, Operand};

/// Test that a mixed chain applies in declaration order and inverts back.
#[test]
fn test_chain_round_trip_mixed_operators() {
    // base 2 -> *3 = 6 -> +5 = 11 -> ^2 = 121
    let chain = ModifierChain::new()
        .with(Modifier::multiplicative("generators", Decimal::from(3.0)))
        .with(Modifier::additive("drip", Decimal::from(5.0)))
        .with(Modifier::exponential("ascension", Decimal::from(2.0)));

    let ctx = EngineContext::new();
    let view = EvalContext::new(&ctx);

    let out = chain.apply(Decimal::from(2.0), &view);
    assert!(out.approx_eq(Decimal::from(121.0), 1e-9));

    let base = chain.invert(out, &view).unwrap();
    assert!(base.approx_eq(Decimal::from(2.0), 1e-9));
}

/// Test that toggling a modifier changes the result without rebuilding the
/// chain.
#[test]
fn test_toggle_via_context_flag() {
    let chain = ModifierChain::new()
        .with(Modifier::multiplicative("base gen", Decimal::from(2.0)))
        .with(
            Modifier::multiplicative("prestige", Decimal::from(10.0))
                .enabled_when(|view| view.flag("prestiged")),
        );

    let mut ctx = EngineContext::new();

    let view = EvalContext::new(&ctx);
    assert_eq!(chain.apply(Decimal::ONE, &view), Decimal::from(2.0));

    ctx.set("prestiged", true);
    let view = EvalContext::new(&ctx);
    assert_eq!(chain.apply(Decimal::ONE, &view), Decimal::from(20.0));

    ctx.set("prestiged", false);
    let view = EvalContext::new(&ctx);
    assert_eq!(chain.apply(Decimal::ONE, &view), Decimal::from(2.0));
}

/// Test that a disabled clamp does not forfeit invertibility.
#[test]
fn test_disabled_clamp_keeps_chain_invertible() {
    let chain = ModifierChain::new()
        .with(Modifier::multiplicative("gen", Decimal::from(4.0)))
        .with(
            Modifier::clamp("softcap", None, Some(Decimal::from(100.0)))
                .enabled_when(|view| view.flag("softcap_on")),
        );

    let mut ctx = EngineContext::new();

    let view = EvalContext::new(&ctx);
    assert!(chain.is_invertible(&view));
    let base = chain.invert(Decimal::from(40.0), &view).unwrap();
    assert!(base.approx_eq(Decimal::from(10.0), 1e-9));

    ctx.set("softcap_on", true);
    let view = EvalContext::new(&ctx);
    assert!(!chain.is_invertible(&view));
    assert!(matches!(
        chain.invert(Decimal::from(40.0), &view),
        Err(EngineError::NotInvertible { .. })
    ));
}

/// Test that the error names the offending modifier.
#[test]
fn test_not_invertible_names_modifier() {
    let chain = ModifierChain::new()
        .with(Modifier::additive("fine", Decimal::ONE))
        .with(Modifier::multiplicative("broken multiplier", Decimal::ZERO));

    let ctx = EngineContext::new();
    let view = EvalContext::new(&ctx);

    match chain.invert(Decimal::from(5.0), &view) {
        Err(EngineError::NotInvertible { modifier, .. }) => {
            assert_eq!(modifier, "broken multiplier");
        }
        other => panic!("expected NotInvertible, got {other:?}"),
    }
}

/// Test chains over values far beyond f64 range.
#[test]
fn test_chain_at_extreme_magnitude() {
    let chain = ModifierChain::new()
        .with(Modifier::multiplicative("gen", Decimal::from(2.0)))
        .with(Modifier::exponent_scale("tower", Decimal::from(3.0)));

    let ctx = EngineContext::new();
    let view = EvalContext::new(&ctx);

    let base = Decimal::from_parts(1.0, 500);
    let out = chain.apply(base, &view);
    // 2e500 with its exponent tripled.
    assert_eq!(out.exponent(), 1500);

    let back = chain.invert(out, &view).unwrap();
    assert!(back.approx_eq(base, 1e-9));
}

/// Test that dynamic operands see resource balances through the view.
#[test]
fn test_dynamic_operand_reads_ledger() {
    use tickmill::{Resource, ResourceId, ResourceLedger};

    let mana = ResourceId::new("mana");
    let mut ledger = ResourceLedger::new();
    ledger.register(Resource::new(mana.clone(), Decimal::from(50.0)));

    let mana_ref = mana.clone();
    let chain = ModifierChain::new().with(Modifier::additive(
        "mana drip",
        Operand::dynamic(move |view| view.amount(&mana_ref)),
    ));

    let ctx = EngineContext::new();
    let view = EvalContext::with_ledger(&ctx, &ledger);
    assert_eq!(chain.apply(Decimal::ZERO, &view), Decimal::from(50.0));
}

proptest! {
    /// For chains built only from invertible operators, invert is the exact
    /// inverse of apply up to float tolerance.
    #[test]
    fn prop_invert_reverses_apply(
        base in 0.1f64..1e6,
        add in -1e3f64..1e3,
        mul in 0.1f64..1e3,
        exp in 0.5f64..3.0,
    ) {
        let chain = ModifierChain::new()
            .with(Modifier::multiplicative("m", Decimal::from(mul)))
            .with(Modifier::additive("a", Decimal::from(add)))
            .with(Modifier::exponential("e", Decimal::from(exp)));

        let ctx = EngineContext::new();
        let view = EvalContext::new(&ctx);

        let x = Decimal::from(base);
        let out = chain.apply(x, &view);
        // The exponential step needs a positive running value for a real
        // root on the way back.
        prop_assume!(!out.is_nan() && out > Decimal::ZERO);
        prop_assume!(x * Decimal::from(mul) + Decimal::from(add) > Decimal::ZERO);

        let back = chain.invert(out, &view).unwrap();
        prop_assert!(back.approx_eq(x, 1e-6), "expected {x}, got {back}");
    }

    /// An empty chain is the identity in both directions for any value.
    #[test]
    fn prop_empty_chain_identity(mantissa in 1.0f64..10.0, exponent in -300i64..300) {
        let chain = ModifierChain::new();
        let ctx = EngineContext::new();
        let view = EvalContext::new(&ctx);

        let x = Decimal::from_parts(mantissa, exponent);
        prop_assert_eq!(chain.apply(x, &view), x);
        prop_assert_eq!(chain.invert(x, &view).unwrap(), x);
    }
}
