//! Per-resident trajectory generation.
//!
//! Selects candidate POIs around the resident's home, renders the prompt and
//! makes exactly one call to the [`GenerativeService`].

use std::fs;
use std::io;
use std::path::Path;

use crate::catalog::PoiCatalog;
use crate::error::PipelineError;
use crate::residents::ResidentProfile;
use crate::traits::{GenerativeService, ResidentId};
use crate::trajectory::RawTrajectory;

pub const DEFAULT_RADIUS_KM: f64 = 10.0;
pub const DEFAULT_MAX_CANDIDATE_CHARS: usize = 5000;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "你是一个模拟北京居民日常出行的轨迹生成助手。请根据用户的属性生成合理且符合逻辑的一天行程轨迹。";

pub const DEFAULT_TEMPLATE: &str = "\
居民属性：
- 年龄：{age}
- 职业：{occupation}
- 消费水平：{budget_level}
- 家庭角色：{family_role}
- 家庭住址坐标（经度,纬度）：{home}

可选地点（均在住址 10 公里范围内）：
{poi_list}

请从可选地点中挑选该居民一天内按时间顺序访问的地点，只输出 JSON 字符串数组，例如 [\"地点A\", \"地点B\"]，不要输出其他内容。";

/// Everything sent to the generative service for one resident.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub resident_id: ResidentId,
    pub system_instruction: String,
    pub user_prompt: String,
    /// Number of POIs in the candidate list before truncation.
    pub candidate_count: usize,
}

/// Prompt text with `{placeholder}` fields.
///
/// Known fields: `age`, `occupation`, `budget_level`, `family_role`, `home`,
/// `poi_list`. `{{` and `}}` render as literal braces; unknown fields are
/// left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let template = Self::new(fs::read_to_string(path)?);
        if !template.text.contains("{poi_list}") {
            tracing::warn!(path = %path.display(), "prompt template has no {{poi_list}} field");
        }
        Ok(template)
    }

    pub fn render(&self, resident: &ResidentProfile, poi_list: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + poi_list.len());
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];

            if rest.starts_with("{{") {
                out.push('{');
                rest = &rest[2..];
            } else if rest.starts_with("}}") {
                out.push('}');
                rest = &rest[2..];
            } else if rest.starts_with('{') {
                let field = rest[1..].find('}').map(|end| &rest[1..=end]);
                let value = field.and_then(|name| field_value(name, resident, poi_list));
                match (field, value) {
                    (Some(name), Some(value)) => {
                        out.push_str(&value);
                        rest = &rest[name.len() + 2..];
                    }
                    _ => {
                        out.push('{');
                        rest = &rest[1..];
                    }
                }
            } else {
                out.push('}');
                rest = &rest[1..];
            }
        }

        out.push_str(rest);
        out
    }
}

fn field_value(name: &str, resident: &ResidentProfile, poi_list: &str) -> Option<String> {
    let value = match name {
        "age" => resident.age.to_string(),
        "occupation" => resident.occupation.clone(),
        "budget_level" => resident.budget_level.clone(),
        "family_role" => resident.family_role.clone(),
        "home" => resident.home.to_string(),
        "poi_list" => poi_list.to_string(),
        _ => return None,
    };
    Some(value)
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Candidate search radius around home.
    pub radius_km: f64,
    /// Character budget for the comma-joined candidate list.
    pub max_candidate_chars: usize,
    pub system_instruction: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            radius_km: DEFAULT_RADIUS_KM,
            max_candidate_chars: DEFAULT_MAX_CANDIDATE_CHARS,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Builds one prompt per resident from nearby POIs and asks the service for a trajectory.
pub struct TrajectoryGenerator<'a, S> {
    catalog: &'a PoiCatalog,
    service: S,
    template: PromptTemplate,
    options: GeneratorOptions,
}

impl<'a, S: GenerativeService> TrajectoryGenerator<'a, S> {
    pub fn new(catalog: &'a PoiCatalog, service: S, template: PromptTemplate, options: GeneratorOptions) -> Self {
        Self {
            catalog,
            service,
            template,
            options,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn build_request(&self, resident: &ResidentProfile) -> GenerationRequest {
        let candidates = self.catalog.nearby(resident.home, self.options.radius_km);
        let joined = candidates
            .iter()
            .map(|poi| poi.name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        tracing::debug!(
            resident = resident.id,
            candidates = candidates.len(),
            chars = joined.chars().count(),
            "built candidate list"
        );

        let poi_list = truncate_chars(&joined, self.options.max_candidate_chars);

        GenerationRequest {
            resident_id: resident.id,
            system_instruction: self.options.system_instruction.clone(),
            user_prompt: self.template.render(resident, poi_list),
            candidate_count: candidates.len(),
        }
    }

    /// One synchronous service call; failures carry the resident id.
    pub fn generate(&self, resident: &ResidentProfile) -> Result<RawTrajectory, PipelineError> {
        tracing::info!(
            resident = resident.id,
            age = resident.age,
            occupation = %resident.occupation,
            "generating trajectory"
        );
        let request = self.build_request(resident);

        match self.service.generate(&request) {
            Ok(text) => {
                tracing::info!(resident = resident.id, "trajectory generated");
                Ok(RawTrajectory::text(text))
            }
            Err(source) => {
                tracing::error!(resident = resident.id, error = %source, "trajectory generation failed");
                Err(PipelineError::Generation {
                    resident_id: resident.id,
                    source,
                })
            }
        }
    }
}

/// The first `max_chars` characters of `text`. May cut a name in half.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
