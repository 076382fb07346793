use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::info;

use crate::batch::WriteBatch;
use crate::pets::repo::{weekday_key, zeroed_week, DayTotals, Pet, WeeklyNutrients};
use crate::state::AppState;

/// The nightly rollover for one pet. After a Saturday the whole ledger is
/// reinitialized for the new week and Saturday's totals are dropped: the
/// ledger describes the current week only, so a finished week has nothing
/// left to say. Any other day archives yesterday's counters into its slot.
pub fn next_week_ledger(yesterday: Weekday, pet: &Pet) -> WeeklyNutrients {
    if yesterday == Weekday::Sat {
        return zeroed_week();
    }

    // Start from a full seven-day ledger so a short map heals itself.
    let mut week = zeroed_week();
    for (day, totals) in &pet.weekly_nutrients {
        if let Some(slot) = week.get_mut(day) {
            *slot = totals.clone();
        }
    }
    week.insert(
        weekday_key(yesterday).to_string(),
        DayTotals {
            calories: pet.calorie_intake,
            carbohydrates: nutrient(pet, "Carbohydrates"),
            crude_fat: nutrient(pet, "CrudeFat"),
            crude_protein: nutrient(pet, "CrudeProtein"),
        },
    );
    week
}

fn nutrient(pet: &Pet, key: &str) -> f64 {
    pet.nutritional_intake.get(key).copied().unwrap_or(0.0)
}

/// Archives yesterday's totals (or rolls the week over) and zeroes the daily
/// counters for every pet. The sentinel record makes a duplicate invocation
/// on the same calendar day a no-op.
pub async fn run(state: &AppState, today: NaiveDate) -> anyhow::Result<()> {
    if state.system.last_reset_date().await? == Some(today) {
        info!(%today, "daily reset already ran today");
        return Ok(());
    }

    let yesterday = today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| anyhow::anyhow!("no day before {today}"))?
        .weekday();

    let pets = state.pets.list_all().await?;
    let count = pets.len();

    let mut batch = WriteBatch::new();
    for pet in pets {
        let weekly = next_week_ledger(yesterday, &pet);
        let store = state.pets.clone();
        batch.push(async move { store.apply_reset(&pet.id, weekly).await });
    }
    batch.flush().await?;

    state.system.set_last_reset_date(today).await?;
    info!(
        %today,
        pets = count,
        rollover = yesterday == Weekday::Sat,
        "daily reset finished"
    );
    Ok(())
}
