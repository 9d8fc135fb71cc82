use crate::listings::{render_applications, render_dashboard, render_jobs};
use clap::Args;
use job_board::error::AppError;
use job_board::marketplace::{
    ApplicationFilter, ApplicationStatus, JobFilter, JobType, MarketplaceService,
    MarketplaceStore, NewJob, NewUser, StatusChange, UserRole,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Leave the application pending instead of moving it to Interview.
    #[arg(long)]
    pub(crate) skip_review: bool,
}

/// Everything the demo produced, kept for rendering and tests.
pub(crate) struct DemoOutcome {
    pub(crate) transcript: Vec<String>,
    pub(crate) service: MarketplaceService,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let outcome = demo_marketplace(args, MarketplaceStore::open_in_memory()?)?;
    println!("Job marketplace demo");
    for line in &outcome.transcript {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn demo_marketplace(
    args: DemoArgs,
    store: MarketplaceStore,
) -> Result<DemoOutcome, AppError> {
    let service = MarketplaceService::new(store);
    let mut transcript = Vec::new();

    let provider = service.register(NewUser {
        username: "acme-hr".to_string(),
        password: "provider-demo".to_string(),
        role: UserRole::Provider,
        name: "Acme HR".to_string(),
        email: "hr@acme.test".to_string(),
    })?;
    let seeker = service.register(NewUser {
        username: "sam".to_string(),
        password: "seeker-demo".to_string(),
        role: UserRole::Seeker,
        name: "Sam Seeker".to_string(),
        email: "sam@mail.test".to_string(),
    })?;
    transcript.push(format!("- Registered provider #{provider} and seeker #{seeker}"));

    let engineer = service.post_job(NewJob {
        provider_id: provider,
        title: "Backend Engineer".to_string(),
        company: "Acme".to_string(),
        salary: Some(80_000.0),
        job_type: JobType::FullTime,
        description: "Build and operate the listings service".to_string(),
    })?;
    service.post_job(NewJob {
        provider_id: provider,
        title: "Support Intern".to_string(),
        company: "Acme".to_string(),
        salary: None,
        job_type: JobType::Internship,
        description: "Help customers find their way around".to_string(),
    })?;

    let application = service.apply(engineer, seeker, "I am qualified")?;
    transcript.push(format!(
        "- Seeker #{seeker} applied to job #{engineer} (application #{application})"
    ));

    if let Err(err) = service.apply(engineer, seeker, "Applying twice") {
        transcript.push(format!("- Second application declined: {err}"));
    }

    if !args.skip_review {
        if let StatusChange::Updated { from, to } =
            service.review_application(application, provider, ApplicationStatus::Interview)?
        {
            transcript.push(format!(
                "- Provider moved application #{application} {from} -> {to}"
            ));
        }
    }

    transcript.push(String::new());
    transcript.push("Open positions".to_string());
    transcript.extend(lines(&render_jobs(&service.jobs(&JobFilter::default())?)));

    transcript.push(String::new());
    transcript.push(format!("Applications for job #{engineer}"));
    transcript.extend(lines(&render_applications(
        &service.applications(&ApplicationFilter::for_job(engineer))?,
    )));

    transcript.push(String::new());
    let user = service.user(provider)?;
    transcript.extend(lines(&render_dashboard(
        &user,
        &service.dashboard(provider)?,
    )));

    Ok(DemoOutcome {
        transcript,
        service,
    })
}

fn lines(block: &str) -> impl Iterator<Item = String> + '_ {
    block.lines().map(str::to_string)
}
