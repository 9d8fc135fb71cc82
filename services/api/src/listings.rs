use crate::cli::StoreArgs;
use crate::infra::{database_config, open_service};
use clap::Args;
use job_board::config::AppConfig;
use job_board::error::AppError;
use job_board::marketplace::{
    ApplicationFilter, ApplicationId, ApplicationStatus, ApplicationView, DashboardStats, JobFilter,
    JobId, JobPosting, JobTypeSelection, MarketplaceService, User, UserId, TIMESTAMP_FORMAT,
};

#[derive(Args, Debug, Default)]
pub(crate) struct JobsArgs {
    /// Substring of the job title
    #[arg(long)]
    pub(crate) title: Option<String>,
    /// Substring of the company name
    #[arg(long)]
    pub(crate) company: Option<String>,
    /// Full-time, Part-time, Contract, Internship, Remote, or All
    #[arg(long)]
    pub(crate) job_type: Option<JobTypeSelection>,
    /// Inclusive lower salary bound
    #[arg(long)]
    pub(crate) min_salary: Option<f64>,
    /// Inclusive upper salary bound
    #[arg(long)]
    pub(crate) max_salary: Option<f64>,
    /// Only jobs posted by this provider id
    #[arg(long)]
    pub(crate) provider: Option<i64>,
    /// Show at most this many of the newest jobs
    #[arg(long)]
    pub(crate) limit: Option<u32>,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

impl JobsArgs {
    fn filter(&self) -> JobFilter {
        JobFilter {
            title: self.title.clone(),
            company: self.company.clone(),
            job_type: self.job_type.unwrap_or_default(),
            min_salary: self.min_salary,
            max_salary: self.max_salary,
            provider_id: self.provider.map(UserId),
            limit: self.limit,
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct ApplicationsArgs {
    /// A single application id
    #[arg(long)]
    pub(crate) id: Option<i64>,
    /// Applications for this job id
    #[arg(long)]
    pub(crate) job: Option<i64>,
    /// Applications sent by this seeker id
    #[arg(long)]
    pub(crate) seeker: Option<i64>,
    /// Applications received by this provider id
    #[arg(long)]
    pub(crate) provider: Option<i64>,
    /// Pending, Reviewing, Interview, Accepted, or Rejected
    #[arg(long)]
    pub(crate) status: Option<ApplicationStatus>,
    /// Show at most this many of the newest applications
    #[arg(long)]
    pub(crate) limit: Option<u32>,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

impl ApplicationsArgs {
    fn filter(&self) -> ApplicationFilter {
        ApplicationFilter {
            application_id: self.id.map(ApplicationId),
            job_id: self.job.map(JobId),
            seeker_id: self.seeker.map(UserId),
            provider_id: self.provider.map(UserId),
            status: self.status,
            limit: self.limit,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct DashboardArgs {
    /// User id whose dashboard to show
    #[arg(long)]
    pub(crate) user: i64,
    #[command(flatten)]
    pub(crate) store: StoreArgs,
}

fn service_for(store: StoreArgs) -> Result<MarketplaceService, AppError> {
    let config = AppConfig::load()?;
    open_service(&database_config(config.database, store.database))
}

pub(crate) fn run_jobs(args: JobsArgs) -> Result<(), AppError> {
    let filter = args.filter();
    let service = service_for(args.store)?;
    print!("{}", render_jobs(&service.jobs(&filter)?));
    Ok(())
}

pub(crate) fn run_applications(args: ApplicationsArgs) -> Result<(), AppError> {
    let filter = args.filter();
    let service = service_for(args.store)?;
    print!("{}", render_applications(&service.applications(&filter)?));
    Ok(())
}

pub(crate) fn run_dashboard(args: DashboardArgs) -> Result<(), AppError> {
    let service = service_for(args.store)?;
    let user_id = UserId(args.user);
    let user = service.user(user_id)?;
    let stats = service.dashboard(user_id)?;
    print!("{}", render_dashboard(&user, &stats));
    Ok(())
}

pub(crate) fn render_jobs(jobs: &[JobPosting]) -> String {
    if jobs.is_empty() {
        return "No jobs found\n".to_string();
    }

    let mut out = format!(
        "{:<5} {:<28} {:<20} {:>14} {:<11} {:<20} {:>4}\n",
        "ID", "Title", "Company", "Salary", "Type", "Posted", "Apps"
    );
    for job in jobs {
        out.push_str(&format!(
            "{:<5} {:<28} {:<20} {:>14} {:<11} {:<20} {:>4}\n",
            job.id.0,
            job.title,
            job.company,
            job.salary_label(),
            job.job_type.label(),
            job.posted_at.format(TIMESTAMP_FORMAT).to_string(),
            job.application_count
        ));
    }
    out
}

pub(crate) fn render_applications(applications: &[ApplicationView]) -> String {
    if applications.is_empty() {
        return "No applications found\n".to_string();
    }

    let mut out = format!(
        "{:<5} {:<24} {:<20} {:<20} {:<20} {:<10}\n",
        "ID", "Job", "Company", "Applicant", "Applied", "Status"
    );
    for application in applications {
        out.push_str(&format!(
            "{:<5} {:<24} {:<20} {:<20} {:<20} {:<10}\n",
            application.id.0,
            application.job_title,
            application.company,
            application.applicant_name,
            application.applied_at.format(TIMESTAMP_FORMAT).to_string(),
            application.status.label()
        ));
    }
    out
}

pub(crate) fn render_dashboard(user: &User, stats: &DashboardStats) -> String {
    let mut out = format!("Dashboard for {} ({})\n", user.name, user.role.label());
    if let Some(total_jobs) = stats.total_jobs {
        out.push_str(&format!("- Jobs posted: {total_jobs}\n"));
        out.push_str(&format!(
            "- Applications received: {}\n",
            stats.total_applications
        ));
    } else {
        out.push_str(&format!("- Applications sent: {}\n", stats.total_applications));
    }

    if stats.status_counts.is_empty() {
        out.push_str("- No applications yet\n");
    }
    for (status, count) in &stats.status_counts {
        out.push_str(&format!("  - {status}: {count}\n"));
    }

    if !stats.recent_applications.is_empty() {
        out.push_str("\nRecent applications\n");
        out.push_str(&render_applications(&stats.recent_applications));
    }
    if !stats.recent_jobs.is_empty() {
        out.push_str("\nRecent jobs\n");
        out.push_str(&render_jobs(&stats.recent_jobs));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use job_board::marketplace::{JobType, UserRole};
    use std::collections::BTreeMap;

    fn posted_at() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("valid timestamp")
    }

    fn received(id: i64, applicant: &str) -> ApplicationView {
        ApplicationView {
            id: ApplicationId(id),
            job_id: JobId(4),
            seeker_id: UserId(2),
            provider_id: UserId(1),
            job_title: "Engineer".to_string(),
            company: "Acme".to_string(),
            applicant_name: applicant.to_string(),
            applicant_email: "sam@mail.test".to_string(),
            applied_at: posted_at(),
            status: ApplicationStatus::Pending,
            cover_letter: "hello".to_string(),
        }
    }

    #[test]
    fn job_rows_show_formatted_salary() {
        let jobs = vec![JobPosting {
            id: JobId(4),
            provider_id: UserId(1),
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            salary: None,
            job_type: JobType::Remote,
            description: String::new(),
            posted_at: posted_at(),
            provider_name: "Acme HR".to_string(),
            provider_email: "hr@acme.test".to_string(),
            application_count: 2,
        }];

        let table = render_jobs(&jobs);
        let row = table.lines().nth(1).expect("data row");
        assert!(row.starts_with("4 "));
        assert!(row.contains("—"));
        assert!(row.contains("Remote"));
        assert!(row.contains("2024-03-01 09:30:00"));
        assert_eq!(render_jobs(&[]), "No jobs found\n");
    }

    #[test]
    fn provider_dashboard_lists_status_counts() {
        let user = User {
            id: UserId(1),
            username: "acme".to_string(),
            role: UserRole::Provider,
            name: "Acme HR".to_string(),
            email: "hr@acme.test".to_string(),
            registered_at: posted_at(),
        };
        let stats = DashboardStats {
            role: UserRole::Provider,
            total_jobs: Some(2),
            total_applications: 3,
            status_counts: BTreeMap::from([
                (ApplicationStatus::Pending, 2),
                (ApplicationStatus::Interview, 1),
            ]),
            recent_jobs: Vec::new(),
            recent_applications: vec![received(9, "Sam Seeker"), received(8, "Ada Applicant")],
        };

        let rendered = render_dashboard(&user, &stats);
        assert!(rendered.contains("Jobs posted: 2"));
        assert!(rendered.contains("Applications received: 3"));
        assert!(rendered.contains("Pending: 2"));
        assert!(rendered.contains("Interview: 1"));
        assert!(!rendered.contains("Recent jobs"));

        let recent: Vec<&str> = rendered
            .lines()
            .skip_while(|line| *line != "Recent applications")
            .skip(2)
            .collect();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].starts_with("9 ") && recent[0].contains("Sam Seeker"));
        assert!(recent[1].starts_with("8 ") && recent[1].contains("Ada Applicant"));
    }

    #[test]
    fn cli_filters_map_onto_store_filters() {
        let args = ApplicationsArgs {
            provider: Some(7),
            status: Some(ApplicationStatus::Accepted),
            limit: Some(5),
            ..ApplicationsArgs::default()
        };
        assert_eq!(
            args.filter(),
            ApplicationFilter::for_provider(UserId(7))
                .status(ApplicationStatus::Accepted)
                .limit(5)
        );

        let jobs = JobsArgs::default().filter();
        assert_eq!(jobs, JobFilter::default());
    }
}
