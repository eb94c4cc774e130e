use crate::models::{JobPosting, UserProfile};

const DEFAULT_LANGUAGE: &str = "english";
const SENIOR_TITLE_MARKERS: &[&str] = &["senior", "sr", "lead", "director", "principal", "head"];

/// Why a posting was dropped from the eligible set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Inactive,
    Location,
    Visa,
    Language,
    Seniority,
}

/// Per-reason rejection counts, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub inactive: usize,
    pub location: usize,
    pub visa: usize,
    pub language: usize,
    pub seniority: usize,
}

impl FilterReport {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::Inactive => self.inactive += 1,
            Rejection::Location => self.location += 1,
            Rejection::Visa => self.visa += 1,
            Rejection::Language => self.language += 1,
            Rejection::Seniority => self.seniority += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inactive + self.location + self.visa + self.language + self.seniority
    }
}

/// Reduce the pool to postings the user is eligible for
///
/// Checks run in order (location, visa, language, seniority) and a posting
/// failing any of them is dropped. Input order is preserved.
pub fn filter_eligible(user: &UserProfile, jobs: &[JobPosting]) -> (Vec<JobPosting>, FilterReport) {
    let mut report = FilterReport::default();
    let eligible = jobs
        .iter()
        .filter(|job| match check_eligibility(user, job) {
            Ok(()) => true,
            Err(rejection) => {
                report.record(rejection);
                false
            }
        })
        .cloned()
        .collect();

    (eligible, report)
}

/// Run every hard constraint against one posting
pub fn check_eligibility(user: &UserProfile, job: &JobPosting) -> Result<(), Rejection> {
    if !job.active {
        return Err(Rejection::Inactive);
    }
    if !matches_location(user, job) {
        return Err(Rejection::Location);
    }
    if !matches_visa(user, job) {
        return Err(Rejection::Visa);
    }
    if !matches_languages(user, job) {
        return Err(Rejection::Language);
    }
    if !matches_seniority(user, job) {
        return Err(Rejection::Seniority);
    }
    Ok(())
}

/// Job city or country intersects one of the user's target cities
///
/// The job's city or country must contain a target, case-insensitively, so
/// "London" matches "Greater London" and "london" but "New York" does not
/// match "York". An empty target list means the user has no location
/// preference.
#[inline]
pub fn matches_location(user: &UserProfile, job: &JobPosting) -> bool {
    if user.target_cities.is_empty() {
        return true;
    }

    let city = job.city.trim().to_lowercase();
    let country = job.country.trim().to_lowercase();

    user.target_cities.iter().any(|target| {
        let target = target.trim().to_lowercase();
        if target.is_empty() {
            return false;
        }
        overlaps(&city, &target) || overlaps(&country, &target)
    })
}

#[inline]
fn overlaps(field: &str, target: &str) -> bool {
    !field.is_empty() && field.contains(target)
}

#[inline]
pub fn matches_visa(user: &UserProfile, job: &JobPosting) -> bool {
    !user.requires_sponsorship() || job.visa_friendly
}

/// Every required language must be spoken; English is assumed when the
/// user listed no languages
#[inline]
pub fn matches_languages(user: &UserProfile, job: &JobPosting) -> bool {
    let spoken: Vec<String> = if user.languages_spoken.is_empty() {
        vec![DEFAULT_LANGUAGE.to_string()]
    } else {
        user.languages_spoken
            .iter()
            .map(|l| l.trim().to_lowercase())
            .collect()
    };

    job.language_requirements
        .iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .all(|required| spoken.iter().any(|s| *s == required))
}

/// Entry-level users never see senior, lead or director roles
#[inline]
pub fn matches_seniority(user: &UserProfile, job: &JobPosting) -> bool {
    if !user.experience_level.is_entry_level() {
        return true;
    }
    !job.experience_level.is_senior() && !has_senior_title(&job.title)
}

fn has_senior_title(title: &str) -> bool {
    title
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .any(|word| SENIOR_TITLE_MARKERS.contains(&word.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExperienceLevel, FreshnessTier, SubscriptionTier, WorkEnvironment};
    use chrono::Utc;

    fn create_test_job(hash: &str, city: &str, visa_friendly: bool) -> JobPosting {
        JobPosting {
            job_hash: hash.to_string(),
            title: "Graduate Analyst".to_string(),
            company: "Acme".to_string(),
            city: city.to_string(),
            country: "United Kingdom".to_string(),
            description: "Join our analytics team".to_string(),
            categories: vec!["finance".to_string()],
            experience_level: ExperienceLevel::Graduate,
            work_environment: WorkEnvironment::Hybrid,
            visa_friendly,
            language_requirements: vec!["English".to_string()],
            posted_at: Utc::now(),
            freshness_tier: FreshnessTier::Fresh,
            active: true,
        }
    }

    fn create_test_user() -> UserProfile {
        UserProfile {
            email: "grad@example.com".to_string(),
            target_cities: vec!["London".to_string()],
            languages_spoken: vec!["English".to_string()],
            visa_status: "EU citizen".to_string(),
            career_path: vec!["finance".to_string()],
            experience_level: ExperienceLevel::Graduate,
            subscription_tier: SubscriptionTier::Free,
            skills: vec![],
            industries: vec![],
        }
    }

    #[test]
    fn test_location_substring_case_insensitive() {
        let user = create_test_user();
        assert!(matches_location(&user, &create_test_job("1", "greater LONDON", true)));
        assert!(!matches_location(&user, &create_test_job("2", "Manchester", true)));
    }

    #[test]
    fn test_location_matches_country() {
        let mut user = create_test_user();
        user.target_cities = vec!["united kingdom".to_string()];
        assert!(matches_location(&user, &create_test_job("1", "Leeds", true)));
    }

    #[test]
    fn test_location_does_not_match_fragments_of_target() {
        let mut user = create_test_user();
        user.target_cities = vec!["Austin".to_string()];
        let mut chicago = create_test_job("chi", "Chicago", true);
        chicago.country = "US".to_string();
        assert!(!matches_location(&user, &chicago));

        user.target_cities = vec!["New York".to_string()];
        let york = create_test_job("york", "York", true);
        assert!(!matches_location(&user, &york));

        let mut berlin_user = create_test_user();
        berlin_user.target_cities = vec!["Berlin".to_string()];
        let mut mumbai = create_test_job("bom", "Mumbai", true);
        mumbai.country = "IN".to_string();
        let (eligible, report) = filter_eligible(&berlin_user, &[mumbai]);
        assert!(eligible.is_empty());
        assert_eq!(report.location, 1);
    }

    #[test]
    fn test_empty_job_city_does_not_match_everything() {
        let user = create_test_user();
        let mut job = create_test_job("1", "", true);
        job.country = String::new();
        assert!(!matches_location(&user, &job));
    }

    #[test]
    fn test_visa_required_needs_friendly_job() {
        let mut user = create_test_user();
        user.visa_status = "requires sponsorship".to_string();
        assert!(matches_visa(&user, &create_test_job("1", "London", true)));
        assert!(!matches_visa(&user, &create_test_job("2", "London", false)));
    }

    #[test]
    fn test_language_defaults_to_english() {
        let mut user = create_test_user();
        user.languages_spoken = vec![];
        assert!(matches_languages(&user, &create_test_job("1", "London", true)));

        let mut job = create_test_job("2", "London", true);
        job.language_requirements = vec!["English".to_string(), "German".to_string()];
        assert!(!matches_languages(&user, &job));
    }

    #[test]
    fn test_senior_roles_hidden_from_graduates() {
        let user = create_test_user();

        let mut tagged = create_test_job("1", "London", true);
        tagged.experience_level = ExperienceLevel::Lead;
        assert!(!matches_seniority(&user, &tagged));

        let mut titled = create_test_job("2", "London", true);
        titled.experience_level = ExperienceLevel::Unknown;
        titled.title = "Sr. Data Engineer".to_string();
        assert!(!matches_seniority(&user, &titled));

        // "Leadership" is not a seniority marker
        let mut programme = create_test_job("3", "London", true);
        programme.title = "Leadership Graduate Programme".to_string();
        assert!(matches_seniority(&user, &programme));
    }

    #[test]
    fn test_filter_eligible_reports_rejections() {
        let user = create_test_user();
        let mut inactive = create_test_job("4", "London", true);
        inactive.active = false;

        let jobs = vec![
            create_test_job("1", "London", true),
            create_test_job("2", "Paris", true),
            create_test_job("3", "London", false),
            inactive,
        ];

        let (eligible, report) = filter_eligible(&user, &jobs);

        assert_eq!(eligible.len(), 2);
        assert_eq!(report.location, 1);
        assert_eq!(report.inactive, 1);
        assert_eq!(report.total(), 2);
    }
}
