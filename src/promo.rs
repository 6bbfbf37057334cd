use async_trait::async_trait;
use serde::Serialize;

use crate::errors::AppError;
use crate::models::PromoAction;

/// Source of promotional offers for an income band.
#[async_trait]
pub trait PromoProvider: Send + Sync {
    /// Returns at most one promo per table for the given integer income band.
    async fn get_promos(&self, income_band: i64, raw_score: f64) -> Result<Vec<String>, AppError>;
}

/// Income-banded promo tables: general promos, card offers, investment offers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromoCatalog {
    pub promo_actions: Vec<PromoAction>,
    pub cards: Vec<PromoAction>,
    pub investment: Vec<PromoAction>,
}

impl PromoCatalog {
    /// The standard offer tables, covering `[0, 1_000_000_000)`.
    pub fn standard() -> Self {
        Self {
            promo_actions: vec![
                PromoAction::new(0, 30_000, "Дарим 500р за отзыв!"),
                PromoAction::new(30_000, 60_000, "Бигфест с кэшбэком 50%!"),
                PromoAction::new(60_000, 120_000, "Пятничный суперкэшбек!"),
                PromoAction::new(120_000, 250_000, "Дополнительная категория кэшбека!"),
                PromoAction::new(
                    250_000,
                    500_000,
                    "Повышенная ставка по накопительному счёту альфа-банка",
                ),
                PromoAction::new(500_000, 1_000_000, "Счёт для бизнеса за 0 рублей!"),
                PromoAction::new(1_000_000, 1_000_000_000, "Дарим платёжное кольцо"),
            ],
            cards: vec![
                PromoAction::new(0, 30_000, "Альфа-Стикер"),
                PromoAction::new(30_000, 60_000, "Сверхтонкий стикер с котами"),
                PromoAction::new(60_000, 120_000, "Карта Альфа и Золотое Яблоко"),
                PromoAction::new(120_000, 250_000, "Карта Альфа и Баста"),
                PromoAction::new(250_000, 1_000_000, "Дебетовая карта Alfa Only Аэрофлот"),
                PromoAction::new(1_000_000, 1_000_000_000, "Дебетовая карта Alfa Only"),
            ],
            investment: vec![
                PromoAction::new(0, 30_000, "Платим 5 000 ₽ каждому"),
                PromoAction::new(30_000, 60_000, "Старт в инвестициях всего со 100 рублей!"),
                PromoAction::new(60_000, 120_000, "Платим 10 000 ₽ каждому"),
                PromoAction::new(120_000, 250_000, "Акции в подарок"),
                PromoAction::new(250_000, 1_000_000, "Инвест-копилка"),
                PromoAction::new(
                    1_000_000,
                    1_000_000_000,
                    "Тарифный план: Персональный брокер",
                ),
            ],
        }
    }

    /// Promos whose range contains `income`, in table order.
    pub fn promos_for(&self, income: i64) -> Vec<String> {
        [&self.promo_actions, &self.cards, &self.investment]
            .into_iter()
            .filter_map(|table| first_match(table, income))
            .collect()
    }
}

fn first_match(table: &[PromoAction], income: i64) -> Option<String> {
    table
        .iter()
        .find(|action| action.contains(income))
        .map(|action| action.promo.clone())
}

/// Promo provider backed by an in-memory catalog.
#[derive(Debug, Clone)]
pub struct StaticPromoProvider {
    catalog: PromoCatalog,
}

impl StaticPromoProvider {
    pub fn new(catalog: PromoCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl PromoProvider for StaticPromoProvider {
    async fn get_promos(&self, income_band: i64, _raw_score: f64) -> Result<Vec<String>, AppError> {
        Ok(self.catalog.promos_for(income_band))
    }
}
