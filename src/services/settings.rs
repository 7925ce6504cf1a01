use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::export::encode_data_url;
use crate::models::settings::COMPANY_SETTINGS_KIND;
use crate::models::{
    CompanyCalendar, CompanyProfile, CompanySettings, DaySchedule, TimeRange, Weekday,
};
use crate::store::{Collection, TenantStore};

/// Profile fields editable through the settings page; the logo has its own endpoint
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[validate(length(max = 120))]
    pub name: String,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

/// Values used until the company saves its own settings
#[derive(Debug, Clone)]
pub struct SettingsDefaults {
    pub currency: String,
    pub production_stages: Vec<String>,
    pub logo_max_bytes: usize,
}

fn warn_irregular(calendar: &CompanyCalendar) {
    let irregular = calendar.irregular_ranges();
    if !irregular.is_empty() {
        let listed: Vec<String> = irregular
            .iter()
            .map(|(day, range)| {
                format!(
                    "{:?} {}-{}",
                    day,
                    range.start.format("%H:%M"),
                    range.end.format("%H:%M")
                )
            })
            .collect();
        warn!(ranges = ?listed, "Calendar has overlapping or out-of-order ranges; stored as given");
    }
}

/// Service for the single company settings document
pub struct SettingsService {
    settings: LiveCollection<CompanySettings>,
    defaults: SettingsDefaults,
    event_sender: Arc<EventSender>,
    write_lock: Mutex<()>,
}

impl SettingsService {
    pub fn new(
        store: TenantStore,
        defaults: SettingsDefaults,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let query = store
            .collection(Collection::Settings)
            .where_eq("kind", COMPANY_SETTINGS_KIND);
        Self {
            settings: LiveCollection::new(store, query),
            defaults,
            event_sender,
            write_lock: Mutex::new(()),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.settings.start()
    }

    pub fn stop(&self) {
        self.settings.stop()
    }

    fn default_settings(&self) -> CompanySettings {
        CompanySettings::with_defaults(
            self.defaults.currency.clone(),
            self.defaults.production_stages.clone(),
        )
    }

    /// Saved settings, or the configured defaults when nothing was saved yet.
    pub async fn get(&self) -> Result<CompanySettings, ServiceError> {
        Ok(self
            .settings
            .snapshot()
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_settings()))
    }

    /// Applies `change` to the stored settings, creating the document on first save.
    async fn upsert<F>(&self, section: &str, change: F) -> Result<CompanySettings, ServiceError>
    where
        F: FnOnce(&mut CompanySettings) -> Result<(), ServiceError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut settings = self
            .settings
            .refresh()
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| self.default_settings());

        change(&mut settings)?;
        settings.updated_at = Some(Utc::now());

        if settings.id.is_empty() {
            let (_, saved) = self.settings.insert(settings).await?;
            settings = saved;
        } else {
            self.settings.save(&settings).await?;
        }

        self.event_sender
            .publish(Event::SettingsUpdated {
                section: section.to_string(),
                timestamp: Utc::now(),
            })
            .await;
        info!(section, "Settings updated");
        Ok(settings)
    }

    /// Replaces the profile fields, keeping the current logo.
    #[instrument(skip(self, input))]
    pub async fn update_profile(&self, input: ProfileInput) -> Result<CompanySettings, ServiceError> {
        input.validate()?;
        self.upsert("profile", move |settings| {
            let logo = settings.profile.logo.take();
            settings.profile = CompanyProfile {
                name: input.name.trim().to_string(),
                address: input.address,
                vat_number: input.vat_number,
                email: input.email,
                phone: input.phone,
                website: input.website,
                logo,
            };
            Ok(())
        })
        .await
    }

    /// Validates an uploaded image and stores it as the company logo.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn set_logo(&self, bytes: &[u8]) -> Result<CompanySettings, ServiceError> {
        let data_url = encode_data_url(bytes, self.defaults.logo_max_bytes)?;
        self.upsert("logo", move |settings| {
            settings.profile.logo = Some(data_url);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn clear_logo(&self) -> Result<CompanySettings, ServiceError> {
        self.upsert("logo", |settings| {
            settings.profile.logo = None;
            Ok(())
        })
        .await
    }

    pub async fn calendar(&self) -> Result<CompanyCalendar, ServiceError> {
        Ok(self.get().await?.calendar)
    }

    /// Replaces the whole calendar. Irregular ranges are stored as given.
    #[instrument(skip(self, calendar))]
    pub async fn update_calendar(
        &self,
        calendar: CompanyCalendar,
    ) -> Result<CompanyCalendar, ServiceError> {
        warn_irregular(&calendar);
        let saved = self
            .upsert("calendar", move |settings| {
                settings.calendar = calendar;
                Ok(())
            })
            .await?;
        Ok(saved.calendar)
    }

    /// Flips a day on or off without touching its ranges.
    #[instrument(skip(self))]
    pub async fn toggle_day(&self, day: Weekday) -> Result<DaySchedule, ServiceError> {
        let saved = self
            .upsert("calendar", move |settings| {
                settings.calendar.toggle_day(day);
                Ok(())
            })
            .await?;
        Ok(saved.calendar.day(day))
    }

    #[instrument(skip(self, ranges))]
    pub async fn set_day_ranges(
        &self,
        day: Weekday,
        ranges: Vec<TimeRange>,
    ) -> Result<DaySchedule, ServiceError> {
        let saved = self
            .upsert("calendar", move |settings| {
                settings.calendar.set_ranges(day, ranges);
                Ok(())
            })
            .await?;
        warn_irregular(&saved.calendar);
        Ok(saved.calendar.day(day))
    }

    pub async fn production_stages(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.get().await?.production_stages)
    }

    /// Replaces the production stages. Names are trimmed and must be unique.
    #[instrument(skip(self))]
    pub async fn set_production_stages(
        &self,
        stages: Vec<String>,
    ) -> Result<Vec<String>, ServiceError> {
        let stages: Vec<String> = stages.iter().map(|s| s.trim().to_string()).collect();
        if stages.is_empty() || stages.iter().any(String::is_empty) {
            return Err(ServiceError::ValidationError(
                "At least one production stage is required and names cannot be blank"
                    .to_string(),
            ));
        }
        let unique: HashSet<String> = stages.iter().map(|s| s.to_lowercase()).collect();
        if unique.len() != stages.len() {
            return Err(ServiceError::ValidationError(
                "Production stage names must be unique".to_string(),
            ));
        }

        let saved = self
            .upsert("stages", move |settings| {
                settings.production_stages = stages;
                Ok(())
            })
            .await?;
        Ok(saved.production_stages)
    }

    pub async fn currency(&self) -> Result<String, ServiceError> {
        Ok(self.get().await?.currency)
    }
}
