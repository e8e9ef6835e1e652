//! Manual content: title, header, introduction and an ordered list of steps.
//!
//! The types mirror the form that authors a manual. They serialize with the
//! camelCase field names the form uses (`manualTitle`, `headerImageUrl`,
//! `steps[].imageUrl`, ...) so exported form snapshots can be loaded as-is.
//! Steps carry a generated identifier that stays attached to the step when
//! other steps are inserted, removed or moved.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::Region;
use crate::image_ref::{ImageRef, ImageRefError};

/// Longest accepted manual title, in characters.
pub const MAX_TITLE_CHARS: usize = 150;
/// Longest accepted step title, in characters.
pub const MAX_STEP_TITLE_CHARS: usize = 100;
/// Longest accepted step description, in characters.
pub const MAX_STEP_DESCRIPTION_CHARS: usize = 1000;
/// Longest accepted introduction, in characters.
pub const MAX_INTRODUCTION_CHARS: usize = 2000;

/// A single instruction step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualStep {
    #[serde(default = "generate_step_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    description: String,
}

fn generate_step_id() -> String {
    Uuid::new_v4().to_string()
}

impl ManualStep {
    /// Creates a step with a freshly generated identifier.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: generate_step_id(),
            title: title.into(),
            image_url: String::new(),
            description: description.into(),
        }
    }

    /// A step with every field empty, as added by the "add step" action.
    pub fn blank() -> Self {
        Self::new("", "")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Replaces the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the image reference (URL, path or data URI).
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_image(&mut self, image_url: impl Into<String>) {
        self.image_url = image_url.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}

/// The whole manual as edited in the form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualData {
    #[serde(default)]
    manual_title: String,
    #[serde(default)]
    header_image_url: String,
    #[serde(default)]
    manual_text_area: String,
    #[serde(default)]
    steps: Vec<ManualStep>,
}

impl ManualData {
    /// Creates a manual with the given title and no steps.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            manual_title: title.into(),
            ..Self::default()
        }
    }

    /// The initial form state: no title and one blank step.
    pub fn starter() -> Self {
        Self::default().with_step(ManualStep::blank())
    }

    /// Parses a manual from its JSON form snapshot.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serializes the manual as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn title(&self) -> &str {
        &self.manual_title
    }

    pub fn header_image_url(&self) -> &str {
        &self.header_image_url
    }

    pub fn introduction(&self) -> &str {
        &self.manual_text_area
    }

    pub fn steps(&self) -> &[ManualStep] {
        &self.steps
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.manual_title = title.into();
    }

    pub fn set_header_image(&mut self, image_url: impl Into<String>) {
        self.header_image_url = image_url.into();
    }

    /// Sets the header image and returns the updated manual.
    pub fn with_header_image(mut self, image_url: impl Into<String>) -> Self {
        self.set_header_image(image_url);
        self
    }

    /// Sets the introduction text and returns the updated manual.
    pub fn with_introduction(mut self, text: impl Into<String>) -> Self {
        self.manual_text_area = text.into();
        self
    }

    /// Appends a step and returns the updated manual.
    pub fn with_step(mut self, step: ManualStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends a step and returns its identifier.
    pub fn add_step(&mut self, step: ManualStep) -> &str {
        self.steps.push(step);
        let last = self.steps.len() - 1;
        &self.steps[last].id
    }

    /// Removes the step at `index`, if present.
    pub fn remove_step(&mut self, index: usize) -> Option<ManualStep> {
        (index < self.steps.len()).then(|| self.steps.remove(index))
    }

    /// Removes the step with the given identifier, if present.
    pub fn remove_step_by_id(&mut self, id: &str) -> Option<ManualStep> {
        let index = self.position_of(id)?;
        self.remove_step(index)
    }

    /// Moves a step to a new position. Returns `false` when either index is out of range.
    pub fn move_step(&mut self, from: usize, to: usize) -> bool {
        if from >= self.steps.len() || to >= self.steps.len() {
            return false;
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        true
    }

    pub fn step(&self, id: &str) -> Option<&ManualStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut ManualStep> {
        self.steps.iter_mut().find(|step| step.id == id)
    }

    /// Current position of the step with the given identifier.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    /// Whether the header region has anything to show under `schema`.
    pub fn has_header_content(&self, schema: &FormSchema) -> bool {
        !self.manual_title.trim().is_empty()
            || !self.header_image_url.trim().is_empty()
            || (schema.introduction && !self.manual_text_area.trim().is_empty())
    }

    /// Regions to export, in document order: the header when it has content,
    /// then every step.
    pub fn regions(&self, schema: &FormSchema) -> Vec<Region> {
        let header = self
            .has_header_content(schema)
            .then_some(Region::Header);
        header
            .into_iter()
            .chain(self.steps.iter().enumerate().map(|(index, step)| Region::Step {
                index,
                id: step.id.clone(),
            }))
            .collect()
    }

    /// Checks every field against the form rules.
    pub fn validate(&self, schema: &FormSchema) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        check_text(
            &mut errors,
            "manualTitle",
            &self.manual_title,
            MAX_TITLE_CHARS,
            "Manual title is required",
            "Manual title is too long",
        );
        check_image(&mut errors, "headerImageUrl", &self.header_image_url, schema);

        if schema.introduction
            && self.manual_text_area.chars().count() > MAX_INTRODUCTION_CHARS
        {
            errors.push(FieldError::new("manualTextArea", "Introduction is too long"));
        }

        for (index, step) in self.steps.iter().enumerate() {
            check_text(
                &mut errors,
                &format!("steps.{index}.title"),
                &step.title,
                MAX_STEP_TITLE_CHARS,
                "Step title is required",
                "Step title is too long",
            );
            check_image(
                &mut errors,
                &format!("steps.{index}.imageUrl"),
                &step.image_url,
                schema,
            );
            check_text(
                &mut errors,
                &format!("steps.{index}.description"),
                &step.description,
                MAX_STEP_DESCRIPTION_CHARS,
                "Step description is required",
                "Step description is too long",
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn check_text(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    max_chars: usize,
    required: &'static str,
    too_long: &'static str,
) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, required));
    } else if value.chars().count() > max_chars {
        errors.push(FieldError::new(field, too_long));
    }
}

fn check_image(errors: &mut Vec<FieldError>, field: &str, value: &str, schema: &FormSchema) {
    let parsed = ImageRef::parse(value);
    let accepted = match (schema.image_policy, &parsed) {
        (_, Ok(ImageRef::None)) => true,
        (ImagePolicy::Url, Ok(ImageRef::Remote(_) | ImageRef::Embedded { .. })) => true,
        (ImagePolicy::Url, Ok(ImageRef::File(_))) => value.trim_start().starts_with("file:"),
        (ImagePolicy::Embedded, Ok(ImageRef::Embedded { .. })) => true,
        _ => false,
    };
    if accepted {
        return;
    }

    let message = match (schema.image_policy, parsed) {
        (ImagePolicy::Embedded, Ok(_)) => "Image must be an embedded data URI",
        (_, Err(ImageRefError::InvalidBase64(_) | ImageRefError::NotBase64)) => {
            "Image data is not valid base64"
        }
        _ => "Please enter a valid URL",
    };
    errors.push(FieldError::new(field, message));
}

/// How image fields are filled in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImagePolicy {
    /// Images are typed in as absolute URLs (data URIs included).
    #[default]
    Url,
    /// Images are uploaded files stored as embedded data URIs.
    Embedded,
}

/// Form variant: how images are entered and whether the introduction field exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub image_policy: ImagePolicy,
    pub introduction: bool,
}

impl Default for FormSchema {
    fn default() -> Self {
        Self {
            image_policy: ImagePolicy::Url,
            introduction: true,
        }
    }
}

impl FormSchema {
    pub fn with_image_policy(mut self, image_policy: ImagePolicy) -> Self {
        self.image_policy = image_policy;
        self
    }

    pub fn with_introduction(mut self, introduction: bool) -> Self {
        self.introduction = introduction;
        self
    }
}

/// A validation message attached to a form field path such as `steps.2.title`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: &'static str,
}

impl FieldError {
    fn new(field: &str, message: &'static str) -> Self {
        Self {
            field: field.to_owned(),
            message,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All validation failures of a manual.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{} invalid field(s): {}", .0.len(), join_errors(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Message for the given field path, if it failed.
    pub fn message_for(&self, field: &str) -> Option<&'static str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ManualData {
        ManualData::new("Desk assembly")
            .with_step(ManualStep::new("Unpack", "Lay out all parts.").with_id("a"))
            .with_step(ManualStep::new("Legs", "Screw on the legs.").with_id("b"))
            .with_step(ManualStep::new("Top", "Attach the top.").with_id("c"))
    }

    #[test]
    fn starter_has_one_blank_step() {
        let manual = ManualData::starter();
        assert_eq!(manual.steps().len(), 1);
        assert!(!manual.steps()[0].id().is_empty());
        assert!(manual.title().is_empty());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ManualStep::blank();
        let b = ManualStep::blank();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn removing_a_step_keeps_other_identities() {
        let mut manual = sample();
        let removed = manual.remove_step(1).expect("step exists");
        assert_eq!(removed.id(), "b");
        assert_eq!(manual.position_of("c"), Some(1));
        assert_eq!(manual.step("c").map(ManualStep::title), Some("Top"));
        assert!(manual.remove_step(7).is_none());
    }

    #[test]
    fn moving_steps_reorders_regions() {
        let mut manual = sample();
        assert!(manual.move_step(2, 0));
        assert!(!manual.move_step(0, 3));
        let ids: Vec<_> = manual.steps().iter().map(ManualStep::id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(
            manual.regions(&FormSchema::default())[1],
            Region::Step {
                index: 0,
                id: "c".into()
            }
        );
    }

    #[test]
    fn header_region_requires_content() {
        let schema = FormSchema::default();
        let mut manual = sample();
        manual.set_title("");
        assert_eq!(manual.regions(&schema).len(), 3);

        manual.set_header_image("https://example.com/a.png");
        assert_eq!(manual.regions(&schema)[0], Region::Header);

        let intro_only = ManualData::default().with_introduction("Read me first");
        assert!(intro_only.has_header_content(&schema));
        assert!(!intro_only.has_header_content(&schema.with_introduction(false)));
    }

    #[test]
    fn validation_reports_form_messages() {
        let mut manual = ManualData::starter();
        manual.set_header_image("not a url at all");
        let errors = manual
            .validate(&FormSchema::default())
            .expect_err("blank form is invalid");

        assert_eq!(errors.message_for("manualTitle"), Some("Manual title is required"));
        assert_eq!(errors.message_for("headerImageUrl"), Some("Please enter a valid URL"));
        assert_eq!(errors.message_for("steps.0.title"), Some("Step title is required"));
        assert_eq!(
            errors.message_for("steps.0.description"),
            Some("Step description is required")
        );
    }

    #[test]
    fn validation_enforces_length_limits() {
        let mut manual = sample();
        manual.set_title("x".repeat(MAX_TITLE_CHARS + 1));
        if let Some(step) = manual.step_mut("a") {
            step.set_description("y".repeat(MAX_STEP_DESCRIPTION_CHARS + 1));
        }
        let errors = manual.validate(&FormSchema::default()).expect_err("too long");
        assert_eq!(errors.message_for("manualTitle"), Some("Manual title is too long"));
        assert_eq!(
            errors.message_for("steps.0.description"),
            Some("Step description is too long")
        );
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn embedded_policy_rejects_urls() {
        let schema = FormSchema::default().with_image_policy(ImagePolicy::Embedded);
        let manual = sample().with_header_image("https://example.com/a.png");
        let errors = manual.validate(&schema).expect_err("url not allowed");
        assert_eq!(
            errors.message_for("headerImageUrl"),
            Some("Image must be an embedded data URI")
        );

        let embedded = sample().with_header_image("data:image/png;base64,aGVsbG8=");
        assert!(embedded.validate(&schema).is_ok());
    }

    #[test]
    fn parses_form_snapshots() {
        let json = r#"{
            "manualTitle": "Router setup",
            "headerImageUrl": "",
            "steps": [
                {"id": "s1", "title": "Plug in", "imageUrl": "", "description": "Connect power."},
                {"title": "Wait", "description": "Wait for the light."}
            ]
        }"#;
        let manual = ManualData::from_json(json).expect("valid json");
        assert_eq!(manual.title(), "Router setup");
        assert_eq!(manual.steps()[0].id(), "s1");
        assert!(!manual.steps()[1].id().is_empty());
        assert!(manual.introduction().is_empty());
        assert!(manual.validate(&FormSchema::default()).is_ok());

        let round_trip = ManualData::from_json(&manual.to_json_pretty().expect("json"))
            .expect("parse again");
        assert_eq!(round_trip, manual);
    }
}
