//! # Pricing Engine
//!
//! Turns a customer's cart into priced, snapshotted order lines.
//!
//! Prices always come from the stored menu: the client only chooses item and
//! customization ids. If the client also echoes a price or action for a
//! customization, it must agree with storage or the cart is rejected.
//!
//! Line subtotal is `(unit price + sum of customization deltas) * quantity`,
//! computed in [`Decimal`] so no float drift enters the order total.

use std::collections::{HashMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::item_customization::{self, CustomizationAction};
use crate::models::menu_item;

/// Largest quantity accepted on a single line.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// A customization the client selected, optionally echoing what it displayed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectedCustomization {
    pub id: Uuid,
    /// Price the client displayed; checked against storage when present.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "1.50")]
    pub price: Option<Decimal>,
    /// Action the client displayed; checked against storage when present.
    #[serde(default)]
    pub action: Option<CustomizationAction>,
}

/// One requested cart line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub item_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub customizations: Vec<SelectedCustomization>,
}

/// A customization frozen into an order line by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomizationSnapshot {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "1.50")]
    pub price: Decimal,
    pub action: CustomizationAction,
}

/// A validated, priced line ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub position: usize,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub customizations: Vec<CustomizationSnapshot>,
    pub subtotal: Decimal,
}

/// Priced cart: lines in submission order and their sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
}

/// Read-only view of the tenant's menu entries referenced by a cart.
#[derive(Debug, Default, Clone)]
pub struct MenuSnapshot {
    items: HashMap<Uuid, menu_item::Model>,
    customizations: HashMap<Uuid, Vec<item_customization::Model>>,
}

impl MenuSnapshot {
    pub fn new(
        items: Vec<menu_item::Model>,
        customizations: Vec<item_customization::Model>,
    ) -> Self {
        let mut by_item: HashMap<Uuid, Vec<item_customization::Model>> = HashMap::new();
        for customization in customizations {
            by_item
                .entry(customization.item_id)
                .or_default()
                .push(customization);
        }
        Self {
            items: items.into_iter().map(|item| (item.id, item)).collect(),
            customizations: by_item,
        }
    }

    fn options_for(&self, item_id: Uuid) -> &[item_customization::Model] {
        self.customizations
            .get(&item_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// `(unit_price + sum(deltas)) * quantity`, exact.
pub fn line_subtotal<I>(unit_price: Decimal, deltas: I, quantity: i32) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let per_unit = deltas.into_iter().fold(unit_price, |acc, delta| acc + delta);
    per_unit * Decimal::from(quantity)
}

/// Presents an amount with exactly two fractional digits.
pub fn to_money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Validates the cart against the menu and prices every line.
///
/// Any invalid line rejects the whole cart; nothing is partially priced.
pub fn price_order(menu: &MenuSnapshot, lines: &[LineRequest]) -> Result<PricedOrder, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::validation_with(
            "Order must contain at least one item",
            json!({ "items": "must not be empty" }),
        ));
    }

    let unavailable: Vec<String> = lines
        .iter()
        .filter(|line| {
            menu.items
                .get(&line.item_id)
                .is_none_or(|item| !item.active || item.deleted_at.is_some())
        })
        .map(|line| line.item_id.to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    if !unavailable.is_empty() {
        let mut unavailable = unavailable;
        unavailable.sort();
        return Err(ServiceError::validation_with(
            "One or more items are not available",
            json!({ "unavailableItemIds": unavailable }),
        ));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        priced.push(price_line(menu, position, line)?);
    }

    let total = to_money(priced.iter().map(|line| line.subtotal).sum());

    Ok(PricedOrder {
        lines: priced,
        total,
    })
}

fn price_line(
    menu: &MenuSnapshot,
    position: usize,
    line: &LineRequest,
) -> Result<PricedLine, ServiceError> {
    let field = |name: &str| format!("items[{position}].{name}");

    if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
        return Err(ServiceError::validation_with(
            format!("Quantity must be between 1 and {MAX_LINE_QUANTITY}"),
            json!({ field("quantity"): line.quantity }),
        ));
    }
    let quantity = line.quantity as i32;

    let item = menu.items.get(&line.item_id).ok_or_else(|| {
        ServiceError::validation(format!("Item {} is not available", line.item_id))
    })?;
    let options = menu.options_for(item.id);

    let mut seen = HashSet::new();
    let mut snapshots = Vec::with_capacity(line.customizations.len());
    for selected in &line.customizations {
        if !seen.insert(selected.id) {
            return Err(ServiceError::validation_with(
                "Customization selected more than once",
                json!({ field("customizations"): selected.id }),
            ));
        }

        let stored = options
            .iter()
            .find(|option| option.id == selected.id)
            .ok_or_else(|| {
                ServiceError::validation_with(
                    format!("Customization does not belong to item '{}'", item.name),
                    json!({ field("customizations"): selected.id }),
                )
            })?;

        let action = stored.action_kind().map_err(|err| {
            tracing::error!(customization_id = %stored.id, error = %err, "Stored customization has unknown action");
            ServiceError::Internal("stored customization has an unknown action".to_string())
        })?;

        if let Some(claimed) = selected.price
            && claimed != stored.price
        {
            return Err(ServiceError::validation_with(
                format!("Price for customization '{}' has changed", stored.name),
                json!({
                    field("customizations"): selected.id,
                    "submittedPrice": claimed,
                    "currentPrice": stored.price,
                }),
            ));
        }

        if let Some(claimed) = selected.action
            && claimed != action
        {
            return Err(ServiceError::validation_with(
                format!("Action for customization '{}' does not match", stored.name),
                json!({
                    field("customizations"): selected.id,
                    "submittedAction": claimed,
                    "currentAction": action,
                }),
            ));
        }

        snapshots.push(CustomizationSnapshot {
            id: stored.id,
            name: stored.name.clone(),
            price: stored.price,
            action,
        });
    }

    check_selection_rules(item, options, &snapshots, &field)?;

    let per_unit = line_subtotal(item.price, snapshots.iter().map(|c| c.price), 1);
    if per_unit.is_sign_negative() && !per_unit.is_zero() {
        return Err(ServiceError::validation_with(
            format!("Customizations reduce '{}' below zero", item.name),
            json!({ field("customizations"): "per-unit price would be negative" }),
        ));
    }

    let subtotal = to_money(line_subtotal(
        item.price,
        snapshots.iter().map(|c| c.price),
        quantity,
    ));

    Ok(PricedLine {
        position,
        item_id: item.id,
        item_name: item.name.clone(),
        unit_price: to_money(item.price),
        quantity,
        customizations: snapshots,
        subtotal,
    })
}

/// CHANGE is required (exactly one) when offered; CHOOSE allows at most one.
fn check_selection_rules(
    item: &menu_item::Model,
    options: &[item_customization::Model],
    selected: &[CustomizationSnapshot],
    field: &dyn Fn(&str) -> String,
) -> Result<(), ServiceError> {
    let offers_change = options
        .iter()
        .any(|option| option.action_kind() == Ok(CustomizationAction::Change));
    let count = |kind: CustomizationAction| selected.iter().filter(|c| c.action == kind).count();

    let changes = count(CustomizationAction::Change);
    if offers_change && changes == 0 {
        return Err(ServiceError::validation_with(
            format!("A CHANGE option must be selected for '{}'", item.name),
            json!({ field("customizations"): "required CHANGE selection missing" }),
        ));
    }
    if changes > 1 {
        return Err(ServiceError::validation_with(
            format!("Only one CHANGE option may be selected for '{}'", item.name),
            json!({ field("customizations"): "multiple CHANGE selections" }),
        ));
    }
    if count(CustomizationAction::Choose) > 1 {
        return Err(ServiceError::validation_with(
            format!("Only one CHOOSE option may be selected for '{}'", item.name),
            json!({ field("customizations"): "multiple CHOOSE selections" }),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(price: Decimal) -> menu_item::Model {
        menu_item::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            item_code: "B01".into(),
            name: "Burger".into(),
            price,
            description: None,
            category: "Mains".into(),
            active: true,
            hidden: false,
            created_at: Utc::now().into(),
            deleted_at: None,
        }
    }

    fn option(
        item: &menu_item::Model,
        name: &str,
        price: Decimal,
        action: CustomizationAction,
    ) -> item_customization::Model {
        item_customization::Model {
            id: Uuid::new_v4(),
            item_id: item.id,
            name: name.into(),
            price,
            action: action.as_str().into(),
        }
    }

    fn pick(id: Uuid) -> SelectedCustomization {
        SelectedCustomization {
            id,
            price: None,
            action: None,
        }
    }

    fn line(item_id: Uuid, quantity: i64, customizations: Vec<SelectedCustomization>) -> LineRequest {
        LineRequest {
            item_id,
            quantity,
            customizations,
        }
    }

    fn validation_message(err: ServiceError) -> String {
        match err {
            ServiceError::Validation { message, .. } => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn subtotal_is_unit_plus_deltas_times_quantity() {
        assert_eq!(
            line_subtotal(dec!(10.00), [dec!(1.50), dec!(-0.25)], 3),
            dec!(33.75)
        );
        assert_eq!(line_subtotal(dec!(0.10), [dec!(0.20)], 3), dec!(0.90));
    }

    #[test]
    fn to_money_keeps_two_fraction_digits() {
        assert_eq!(to_money(dec!(10)).to_string(), "10.00");
        assert_eq!(to_money(dec!(2.005)).to_string(), "2.01");
    }

    #[test]
    fn prices_simple_cart() {
        let burger = item(dec!(10.00));
        let menu = MenuSnapshot::new(vec![burger.clone()], vec![]);

        let priced = price_order(&menu, &[line(burger.id, 1, vec![])]).unwrap();

        assert_eq!(priced.total, dec!(10.00));
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.lines[0].item_name, "Burger");
        assert_eq!(priced.lines[0].subtotal, dec!(10.00));
    }

    #[test]
    fn total_is_sum_of_line_subtotals() {
        let burger = item(dec!(8.40));
        let cheese = option(&burger, "Cheese", dec!(0.70), CustomizationAction::Add);
        let onion = option(&burger, "No onion", dec!(0.00), CustomizationAction::Remove);
        let fries = item(dec!(3.15));
        let menu = MenuSnapshot::new(
            vec![burger.clone(), fries.clone()],
            vec![cheese.clone(), onion.clone()],
        );

        let priced = price_order(
            &menu,
            &[
                line(burger.id, 2, vec![pick(cheese.id), pick(onion.id)]),
                line(fries.id, 3, vec![]),
            ],
        )
        .unwrap();

        assert_eq!(priced.lines[0].subtotal, dec!(18.20));
        assert_eq!(priced.lines[1].subtotal, dec!(9.45));
        assert_eq!(priced.total, dec!(27.65));
        assert_eq!(
            priced.total,
            priced.lines.iter().map(|l| l.subtotal).sum::<Decimal>()
        );
        assert_eq!(priced.lines[0].customizations.len(), 2);
        assert_eq!(priced.lines[0].customizations[0].name, "Cheese");
    }

    #[test]
    fn inactive_or_foreign_items_reject_whole_cart() {
        let burger = item(dec!(10.00));
        let mut soup = item(dec!(4.00));
        soup.active = false;
        let menu = MenuSnapshot::new(vec![burger.clone(), soup.clone()], vec![]);

        let err = price_order(
            &menu,
            &[line(burger.id, 1, vec![]), line(soup.id, 1, vec![])],
        )
        .unwrap_err();
        assert_eq!(validation_message(err), "One or more items are not available");

        let err = price_order(&menu, &[line(Uuid::new_v4(), 1, vec![])]).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn rejects_non_positive_or_huge_quantities() {
        let burger = item(dec!(10.00));
        let menu = MenuSnapshot::new(vec![burger.clone()], vec![]);

        for quantity in [0, -1, MAX_LINE_QUANTITY + 1] {
            let err = price_order(&menu, &[line(burger.id, quantity, vec![])]).unwrap_err();
            assert!(validation_message(err).starts_with("Quantity must be between"));
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = price_order(&MenuSnapshot::default(), &[]).unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[test]
    fn change_selection_is_required_when_offered() {
        let coffee = item(dec!(3.00));
        let oat = option(&coffee, "Oat milk", dec!(0.50), CustomizationAction::Change);
        let soy = option(&coffee, "Soy milk", dec!(0.50), CustomizationAction::Change);
        let menu = MenuSnapshot::new(vec![coffee.clone()], vec![oat.clone(), soy.clone()]);

        let err = price_order(&menu, &[line(coffee.id, 1, vec![])]).unwrap_err();
        assert!(validation_message(err).contains("CHANGE option must be selected"));

        let err =
            price_order(&menu, &[line(coffee.id, 1, vec![pick(oat.id), pick(soy.id)])]).unwrap_err();
        assert!(validation_message(err).contains("Only one CHANGE"));

        let priced = price_order(&menu, &[line(coffee.id, 2, vec![pick(oat.id)])]).unwrap();
        assert_eq!(priced.total, dec!(7.00));
    }

    #[test]
    fn choose_is_optional_but_single() {
        let salad = item(dec!(6.00));
        let ranch = option(&salad, "Ranch", dec!(0.00), CustomizationAction::Choose);
        let caesar = option(&salad, "Caesar", dec!(0.25), CustomizationAction::Choose);
        let menu = MenuSnapshot::new(vec![salad.clone()], vec![ranch.clone(), caesar.clone()]);

        assert!(price_order(&menu, &[line(salad.id, 1, vec![])]).is_ok());
        assert!(price_order(&menu, &[line(salad.id, 1, vec![pick(caesar.id)])]).is_ok());
        let err = price_order(
            &menu,
            &[line(salad.id, 1, vec![pick(ranch.id), pick(caesar.id)])],
        )
        .unwrap_err();
        assert!(validation_message(err).contains("Only one CHOOSE"));
    }

    #[test]
    fn tampered_price_or_action_is_rejected() {
        let burger = item(dec!(10.00));
        let bacon = option(&burger, "Bacon", dec!(2.00), CustomizationAction::Add);
        let menu = MenuSnapshot::new(vec![burger.clone()], vec![bacon.clone()]);

        let mut cheap = pick(bacon.id);
        cheap.price = Some(dec!(0.00));
        let err = price_order(&menu, &[line(burger.id, 1, vec![cheap])]).unwrap_err();
        assert!(validation_message(err).contains("has changed"));

        let mut wrong_action = pick(bacon.id);
        wrong_action.action = Some(CustomizationAction::Remove);
        let err = price_order(&menu, &[line(burger.id, 1, vec![wrong_action])]).unwrap_err();
        assert!(validation_message(err).contains("does not match"));

        let mut honest = pick(bacon.id);
        honest.price = Some(dec!(2.00));
        honest.action = Some(CustomizationAction::Add);
        let priced = price_order(&menu, &[line(burger.id, 1, vec![honest])]).unwrap();
        assert_eq!(priced.total, dec!(12.00));
    }

    #[test]
    fn foreign_or_duplicate_customizations_are_rejected() {
        let burger = item(dec!(10.00));
        let pizza = item(dec!(12.00));
        let olives = option(&pizza, "Olives", dec!(1.00), CustomizationAction::Add);
        let bacon = option(&burger, "Bacon", dec!(2.00), CustomizationAction::Add);
        let menu = MenuSnapshot::new(
            vec![burger.clone(), pizza.clone()],
            vec![olives.clone(), bacon.clone()],
        );

        let err = price_order(&menu, &[line(burger.id, 1, vec![pick(olives.id)])]).unwrap_err();
        assert!(validation_message(err).contains("does not belong"));

        let err = price_order(
            &menu,
            &[line(burger.id, 1, vec![pick(bacon.id), pick(bacon.id)])],
        )
        .unwrap_err();
        assert!(validation_message(err).contains("more than once"));
    }

    #[test]
    fn discounts_may_not_make_a_line_negative() {
        let water = item(dec!(1.00));
        let promo = option(&water, "Promo", dec!(-2.00), CustomizationAction::Remove);
        let small = option(&water, "No ice", dec!(-0.50), CustomizationAction::Remove);
        let menu = MenuSnapshot::new(vec![water.clone()], vec![promo.clone(), small.clone()]);

        let err = price_order(&menu, &[line(water.id, 1, vec![pick(promo.id)])]).unwrap_err();
        assert!(validation_message(err).contains("below zero"));

        let priced = price_order(&menu, &[line(water.id, 2, vec![pick(small.id)])]).unwrap();
        assert_eq!(priced.total, dec!(1.00));
    }
}
