use serde::{Deserialize, Serialize};

/// A company that is in the news and attracting attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCompany {
    pub name: String,
    pub ticker: String,
    /// Why the company is trending in the news.
    pub reason: String,
}

/// Output of `find_trending_companies`. Two or three entries are expected but not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCompanyList {
    pub companies: Vec<TrendingCompany>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCompanyResearch {
    pub name: String,
    pub market_position: String,
    pub future_outlook: String,
    pub investment_potential: String,
}

/// Output of `research_trending_companies`, one entry per trending company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingCompanyResearchList {
    pub research_list: Vec<TrendingCompanyResearch>,
}
