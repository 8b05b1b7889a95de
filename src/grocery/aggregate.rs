use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use super::expand::ScaledIngredient;

/// Fractional digits kept on stored grocery amounts.
pub const AMOUNT_SCALE: u32 = 3;

/// One grocery line: the sum of every scaled ingredient sharing a bucket key.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedItem {
    pub ingredient_name: String,
    pub amount: Decimal,
    pub unit_code: String,
    pub is_pantry_staple: bool,
    pub bucket_key: String,
}

/// Rounds half away from zero to three places and drops trailing zeros.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Folds scaled ingredients into one item per bucket key.
///
/// The first occurrence of a bucket fixes its display name, unit and pantry
/// flag; later occurrences only add to the amount. Output follows first-seen
/// bucket order and amounts are rounded once, after summing.
pub fn aggregate<I>(scaled: I) -> Vec<MergedItem>
where
    I: IntoIterator<Item = ScaledIngredient>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<MergedItem> = Vec::new();

    for item in scaled {
        match index.get(&item.bucket_key) {
            Some(&pos) => {
                let current = &mut merged[pos];
                current.amount = current.amount.saturating_add(item.amount);
            }
            None => {
                index.insert(item.bucket_key.clone(), merged.len());
                merged.push(MergedItem {
                    ingredient_name: item.display_name,
                    amount: item.amount,
                    unit_code: item.unit_code,
                    is_pantry_staple: item.is_pantry_staple,
                    bucket_key: item.bucket_key,
                });
            }
        }
    }

    for item in &mut merged {
        item.amount = round_amount(item.amount);
    }
    merged
}
