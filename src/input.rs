//! User input for an analysis run.
//!
//! A `UserInput` is built once, validated, and never mutated afterwards.
//! Theories declare which [`InputField`]s they need; presence is answered by
//! [`UserInput::has_field`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How sure the person is about their birth time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthCertainty {
    /// The hour is known exactly.
    #[default]
    Exact,
    /// The hour is a best guess.
    Approximate,
    /// The hour is not known.
    Unknown,
}

/// Calendar a birth date is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarType {
    #[default]
    Solar,
    Lunar,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

/// A complete birth date with optional time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthInfo {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minute: Option<u32>,
    #[serde(default)]
    pub calendar: CalendarType,
    #[serde(default)]
    pub certainty: BirthCertainty,
}

impl BirthInfo {
    /// Returns the hour only when it can be relied upon.
    #[must_use]
    pub fn usable_hour(&self) -> Option<u32> {
        match self.certainty {
            BirthCertainty::Unknown => None,
            BirthCertainty::Exact | BirthCertainty::Approximate => self.hour,
        }
    }
}

/// Birth attributes of someone other than the person asking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonBirthInfo {
    /// Free-form role label ("spouse", "father", ...).
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth: Option<BirthInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
}

/// Field a theory can require or weight.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    QuestionType,
    QuestionDescription,
    CurrentTime,
    InquiryTime,
    BirthYear,
    BirthMonth,
    BirthDay,
    BirthHour,
    CalendarType,
    Gender,
    BirthLongitude,
    /// No classical theory weighs this; custom specs may require it.
    Mbti,
    Numbers,
    Character,
    FavoriteColor,
    Direction,
    AdditionalPersons,
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::QuestionType => "question_type",
            Self::QuestionDescription => "question_description",
            Self::CurrentTime => "current_time",
            Self::InquiryTime => "inquiry_time",
            Self::BirthYear => "birth_year",
            Self::BirthMonth => "birth_month",
            Self::BirthDay => "birth_day",
            Self::BirthHour => "birth_hour",
            Self::CalendarType => "calendar_type",
            Self::Gender => "gender",
            Self::BirthLongitude => "birth_longitude",
            Self::Mbti => "mbti",
            Self::Numbers => "numbers",
            Self::Character => "character",
            Self::FavoriteColor => "favorite_color",
            Self::Direction => "direction",
            Self::AdditionalPersons => "additional_persons",
        };
        f.write_str(name)
    }
}

/// Immutable request for one analysis.
///
/// # Examples
///
/// ```
/// use mantic::input::{InputField, UserInput};
///
/// let input = UserInput::builder()
///     .question("career", "Should I accept the offer?")
///     .numbers(vec![3, 8, 5])
///     .build()
///     .unwrap();
/// assert!(input.has_field(InputField::Numbers));
/// assert!(!input.has_field(InputField::BirthYear));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub question_type: String,
    pub question_description: String,
    pub current_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inquiry_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth: Option<BirthInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbti: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_persons: Vec<PersonBirthInfo>,
}

impl UserInput {
    /// Creates a new input builder.
    #[must_use]
    pub fn builder() -> UserInputBuilder {
        UserInputBuilder::default()
    }

    /// Returns true if `field` carries usable data.
    #[must_use]
    pub fn has_field(&self, field: InputField) -> bool {
        match field {
            InputField::QuestionType => !self.question_type.trim().is_empty(),
            InputField::QuestionDescription => !self.question_description.trim().is_empty(),
            InputField::CurrentTime => true,
            InputField::InquiryTime => self.inquiry_time.is_some(),
            InputField::BirthYear
            | InputField::BirthMonth
            | InputField::BirthDay
            | InputField::CalendarType => self.birth.is_some(),
            InputField::BirthHour => {
                self.birth.as_ref().and_then(BirthInfo::usable_hour).is_some()
            }
            InputField::Gender => self.gender.is_some(),
            InputField::BirthLongitude => self.birth_longitude.is_some(),
            InputField::Mbti => self.mbti.as_deref().is_some_and(|m| !m.trim().is_empty()),
            InputField::Numbers => !self.numbers.is_empty(),
            InputField::Character => self.character.is_some(),
            InputField::FavoriteColor => {
                self.favorite_color.as_deref().is_some_and(|c| !c.trim().is_empty())
            }
            InputField::Direction => self.direction.is_some(),
            InputField::AdditionalPersons => !self.additional_persons.is_empty(),
        }
    }

    /// Birth-time certainty, `Unknown` when no birth date was given.
    #[must_use]
    pub fn birth_certainty(&self) -> BirthCertainty {
        self.birth
            .as_ref()
            .map_or(BirthCertainty::Unknown, |b| b.certainty)
    }

    /// Time the question was first asked, falling back to the current time.
    #[must_use]
    pub fn effective_inquiry_time(&self) -> DateTime<Utc> {
        self.inquiry_time.unwrap_or(self.current_time)
    }

    /// Stable digest of the input, used to correlate log lines of one request.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex()[..16].to_string()
    }
}

/// Builder for [`UserInput`].
#[derive(Debug, Default)]
pub struct UserInputBuilder {
    question_type: Option<String>,
    question_description: Option<String>,
    current_time: Option<DateTime<Utc>>,
    inquiry_time: Option<DateTime<Utc>>,
    birth_year: Option<i32>,
    birth_month: Option<u32>,
    birth_day: Option<u32>,
    birth_hour: Option<u32>,
    birth_minute: Option<u32>,
    calendar: CalendarType,
    certainty: BirthCertainty,
    gender: Option<Gender>,
    birth_longitude: Option<f64>,
    mbti: Option<String>,
    numbers: Vec<u32>,
    character: Option<char>,
    favorite_color: Option<String>,
    direction: Option<Direction>,
    additional_persons: Vec<PersonBirthInfo>,
}

impl UserInputBuilder {
    /// Sets the question category and free-text description.
    #[must_use]
    pub fn question(
        mut self,
        question_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.question_type = Some(question_type.into());
        self.question_description = Some(description.into());
        self
    }

    /// Sets the current time (defaults to now).
    #[must_use]
    pub fn current_time(mut self, at: DateTime<Utc>) -> Self {
        self.current_time = Some(at);
        self
    }

    /// Sets the time the question was first asked.
    #[must_use]
    pub fn inquiry_time(mut self, at: DateTime<Utc>) -> Self {
        self.inquiry_time = Some(at);
        self
    }

    /// Sets a full birth date.
    #[must_use]
    pub fn birth_date(mut self, year: i32, month: u32, day: u32) -> Self {
        self.birth_year = Some(year);
        self.birth_month = Some(month);
        self.birth_day = Some(day);
        self
    }

    #[must_use]
    pub fn birth_year(mut self, year: i32) -> Self {
        self.birth_year = Some(year);
        self
    }

    #[must_use]
    pub fn birth_month(mut self, month: u32) -> Self {
        self.birth_month = Some(month);
        self
    }

    #[must_use]
    pub fn birth_day(mut self, day: u32) -> Self {
        self.birth_day = Some(day);
        self
    }

    /// Sets the birth time and how certain it is.
    #[must_use]
    pub fn birth_time(mut self, hour: u32, minute: Option<u32>, certainty: BirthCertainty) -> Self {
        self.birth_hour = Some(hour);
        self.birth_minute = minute;
        self.certainty = certainty;
        self
    }

    /// Marks the birth time as unknown.
    #[must_use]
    pub fn birth_time_unknown(mut self) -> Self {
        self.birth_hour = None;
        self.birth_minute = None;
        self.certainty = BirthCertainty::Unknown;
        self
    }

    #[must_use]
    pub fn calendar(mut self, calendar: CalendarType) -> Self {
        self.calendar = calendar;
        self
    }

    #[must_use]
    pub fn gender(mut self, gender: Gender) -> Self {
        self.gender = Some(gender);
        self
    }

    #[must_use]
    pub fn birth_longitude(mut self, longitude: f64) -> Self {
        self.birth_longitude = Some(longitude);
        self
    }

    #[must_use]
    pub fn mbti(mut self, mbti: impl Into<String>) -> Self {
        self.mbti = Some(mbti.into().to_uppercase());
        self
    }

    /// Sets the random numbers (three or six).
    #[must_use]
    pub fn numbers(mut self, numbers: Vec<u32>) -> Self {
        self.numbers = numbers;
        self
    }

    #[must_use]
    pub fn character(mut self, character: char) -> Self {
        self.character = Some(character);
        self
    }

    #[must_use]
    pub fn favorite_color(mut self, color: impl Into<String>) -> Self {
        self.favorite_color = Some(color.into());
        self
    }

    #[must_use]
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    #[must_use]
    pub fn additional_person(mut self, person: PersonBirthInfo) -> Self {
        self.additional_persons.push(person);
        self
    }

    /// Validates and builds the input.
    ///
    /// # Errors
    ///
    /// - `MissingField` when no question was set
    /// - `IncompleteBirthDate` when only part of a birth date (or a birth time
    ///   without a date) was given
    /// - `InvalidBirthDate` for impossible dates or times
    /// - `InvalidNumberCount` when numbers are present but not a triplet or sextuplet
    pub fn build(self) -> Result<UserInput, ValidationError> {
        let question_type = self.question_type.ok_or(ValidationError::MissingField {
            field: "question_type".to_string(),
        })?;
        let question_description = self.question_description.ok_or(ValidationError::MissingField {
            field: "question_description".to_string(),
        })?;

        let birth = assemble_birth(
            self.birth_year,
            self.birth_month,
            self.birth_day,
            self.birth_hour,
            self.birth_minute,
            self.calendar,
            self.certainty,
        )?;

        if !self.numbers.is_empty() && !matches!(self.numbers.len(), 3 | 6) {
            return Err(ValidationError::InvalidNumberCount {
                count: self.numbers.len(),
            });
        }

        for person in &self.additional_persons {
            if let Some(b) = &person.birth {
                validate_birth(b)?;
            }
        }

        Ok(UserInput {
            question_type,
            question_description,
            current_time: self.current_time.unwrap_or_else(Utc::now),
            inquiry_time: self.inquiry_time,
            birth,
            gender: self.gender,
            birth_longitude: self.birth_longitude,
            mbti: self.mbti,
            numbers: self.numbers,
            character: self.character,
            favorite_color: self.favorite_color,
            direction: self.direction,
            additional_persons: self.additional_persons,
        })
    }
}

fn assemble_birth(
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    calendar: CalendarType,
    certainty: BirthCertainty,
) -> Result<Option<BirthInfo>, ValidationError> {
    match (year, month, day) {
        (None, None, None) => {
            if hour.is_some() || minute.is_some() {
                return Err(ValidationError::IncompleteBirthDate {
                    missing: "year, month, day".to_string(),
                });
            }
            Ok(None)
        }
        (Some(year), Some(month), Some(day)) => {
            let birth = BirthInfo {
                year,
                month,
                day,
                hour,
                minute,
                calendar,
                certainty,
            };
            validate_birth(&birth)?;
            Ok(Some(birth))
        }
        (year, month, day) => {
            let missing: Vec<&str> = [
                ("year", year.is_none()),
                ("month", month.is_none()),
                ("day", day.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            Err(ValidationError::IncompleteBirthDate {
                missing: missing.join(", "),
            })
        }
    }
}

fn validate_birth(birth: &BirthInfo) -> Result<(), ValidationError> {
    let date_ok = match birth.calendar {
        CalendarType::Solar => {
            NaiveDate::from_ymd_opt(birth.year, birth.month, birth.day).is_some()
        }
        // Lunar months have at most 30 days; leap months are resolved by the calculators.
        CalendarType::Lunar => (1..=12).contains(&birth.month) && (1..=30).contains(&birth.day),
    };
    if !date_ok {
        return Err(ValidationError::InvalidBirthDate {
            reason: format!(
                "{}-{:02}-{:02} ({:?})",
                birth.year, birth.month, birth.day, birth.calendar
            ),
        });
    }
    if birth.hour.is_some_and(|h| h > 23) || birth.minute.is_some_and(|m| m > 59) {
        return Err(ValidationError::InvalidBirthDate {
            reason: format!("time {:?}:{:?} out of range", birth.hour, birth.minute),
        });
    }
    Ok(())
}
