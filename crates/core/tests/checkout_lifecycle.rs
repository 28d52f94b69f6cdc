//! Checkout lifecycle walks

use testresult::TestResult;
use vitrine::{
    lifecycle::{
        CheckoutStatus, ItemAction, LiveCartItemStatus, LiveCartStatus, OrderStatus, Stage,
        Transition, TransitionError,
    },
    products::ProductUuid,
    stock::{Size, StockKey, StockLevel},
    totals::{LineAmounts, Totals},
};

/// Both kinds reach the same stages for the same payment story.
fn walk<S: CheckoutStatus>(start: S, transitions: &[Transition]) -> Result<Stage, TransitionError> {
    transitions
        .iter()
        .try_fold(start, |status, transition| status.apply(*transition))
        .map(S::stage)
}

#[test]
fn both_kinds_share_the_payment_path() -> TestResult {
    let order = walk(
        OrderStatus::Pending,
        &[Transition::RequestPayment, Transition::ConfirmPayment],
    )?;
    let bag = walk(
        LiveCartStatus::Open,
        &[
            Transition::BeginConfirmation,
            Transition::RequestPayment,
            Transition::ConfirmPayment,
        ],
    )?;

    assert_eq!(order, Stage::Paid);
    assert_eq!(bag, Stage::Paid);

    Ok(())
}

#[test]
fn payment_after_expiry_goes_through_revival() -> TestResult {
    let recovered = walk(
        OrderStatus::AwaitingPayment,
        &[Transition::Expire, Transition::Revive, Transition::ConfirmPayment],
    )?;

    assert_eq!(recovered, Stage::Paid);

    let straight = walk(
        OrderStatus::AwaitingPayment,
        &[Transition::Expire, Transition::ConfirmPayment],
    );

    assert!(straight.is_err(), "expired orders must be revived before payment");

    Ok(())
}

#[test]
fn stock_round_trip_through_a_paid_bag() -> TestResult {
    let key = StockKey::new(ProductUuid::new(), Size::new("G"));
    let mut level = StockLevel::new(3);
    let mut item = LiveCartItemStatus::Reserved;

    level.commit(&key, 2)?;
    item = item.apply(ItemAction::Confirm)?;

    let forced = LiveCartItemStatus::forced_by(Stage::Paid).unwrap_or(item);

    assert_eq!(forced, LiveCartItemStatus::Confirmed);

    level.settle(&key, 2)?;

    assert_eq!(level.on_hand(), 1);
    assert_eq!(level.available(), 1);

    let totals = Totals::compute(
        [LineAmounts {
            quantity: 2,
            unit_price: 7_990,
            original_unit_price: 9_990,
        }],
        0,
        0,
    )?;

    assert_eq!(totals.total, 15_980);
    assert_eq!(totals.discounts, 4_000);

    Ok(())
}
