use crate::domain::schema::{
    TrendingCompany, TrendingCompanyList, TrendingCompanyResearch, TrendingCompanyResearchList,
};
use anyhow::{ensure, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// Output contract of a structured pipeline stage.
///
/// `json_schema` is handed to the provider as a structured-output constraint; `validate` runs
/// after decoding and rejects anything that serde accepted but that leaves a required field
/// unpopulated (blank strings, an empty list).
pub trait StageSchema: Serialize + DeserializeOwned + Send + Sized {
    const NAME: &'static str;

    fn json_schema() -> Value;

    fn validate(self) -> anyhow::Result<Self>;
}

fn required_text(field: &'static str, value: String) -> anyhow::Result<String> {
    let value = value.trim().to_string();
    ensure!(!value.is_empty(), "{field} must be non-empty");
    Ok(value)
}

fn object_schema(required: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = required
        .iter()
        .map(|name| (name.to_string(), json!({"type": "string"})))
        .collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": required,
        "properties": properties,
    })
}

impl StageSchema for TrendingCompanyList {
    const NAME: &'static str = "trending_company_list";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["companies"],
            "properties": {
                "companies": {
                    "type": "array",
                    "items": object_schema(&["name", "ticker", "reason"]),
                }
            }
        })
    }

    fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            !self.companies.is_empty(),
            "companies must contain at least one entry"
        );

        let mut companies = Vec::with_capacity(self.companies.len());
        for (idx, company) in self.companies.into_iter().enumerate() {
            let company = company
                .validate_and_trim()
                .with_context(|| format!("invalid companies[{idx}]"))?;
            companies.push(company);
        }

        Ok(Self { companies })
    }
}

impl StageSchema for TrendingCompanyResearchList {
    const NAME: &'static str = "trending_company_research_list";

    fn json_schema() -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["research_list"],
            "properties": {
                "research_list": {
                    "type": "array",
                    "items": object_schema(&[
                        "name",
                        "market_position",
                        "future_outlook",
                        "investment_potential",
                    ]),
                }
            }
        })
    }

    fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            !self.research_list.is_empty(),
            "research_list must contain at least one entry"
        );

        let mut research_list = Vec::with_capacity(self.research_list.len());
        for (idx, research) in self.research_list.into_iter().enumerate() {
            let research = research
                .validate_and_trim()
                .with_context(|| format!("invalid research_list[{idx}]"))?;
            research_list.push(research);
        }

        Ok(Self { research_list })
    }
}

impl TrendingCompany {
    fn validate_and_trim(self) -> anyhow::Result<Self> {
        Ok(Self {
            name: required_text("name", self.name)?,
            ticker: required_text("ticker", self.ticker)?,
            reason: required_text("reason", self.reason)?,
        })
    }
}

impl TrendingCompanyResearch {
    fn validate_and_trim(self) -> anyhow::Result<Self> {
        Ok(Self {
            name: required_text("name", self.name)?,
            market_position: required_text("market_position", self.market_position)?,
            future_outlook: required_text("future_outlook", self.future_outlook)?,
            investment_potential: required_text("investment_potential", self.investment_potential)?,
        })
    }
}
