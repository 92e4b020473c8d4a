use std::{process, sync::Arc};

use tokio::{signal, sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        chrome::ChromeService,
        error::AppError,
        feed::FeedService,
        follow::FollowService,
        posts::PostService,
        repos::{
            BlobStore, CommentsRepo, CreateUserParams, FollowsRepo, GroupsRepo, HealthRepo,
            PostsRepo, PostsWriteRepo, UsersRepo,
        },
        viewer::ViewerService,
    },
    cache::{PageCacheConfig, PageCacheState},
    config,
    domain::{groups::NewGroup, users::validate_username},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, AuthPolicy, HttpState},
        telemetry,
        uploads::FsBlobStore,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Users(args) => match args.command {
            config::UsersCommand::Create(args) => run_create_user(settings, args).await,
        },
        config::Command::Groups(args) => match args.command {
            config::GroupsCommand::Create(args) => run_create_group(settings, args).await,
        },
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let (http_state, admin_state) = build_application_context(repositories, &settings)?;
    serve_http(&settings, http_state, admin_state).await
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    let username = validate_username(&args.username)?.to_string();
    let repositories = init_repositories(&settings).await?;

    let user = repositories
        .create_user(CreateUserParams {
            username,
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
        })
        .await?;

    info!(
        target = "yatube::cli::users",
        user_id = %user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    let group = NewGroup::parse(&args.title, args.slug.as_deref(), &args.description)?;
    let repositories = init_repositories(&settings).await?;

    let group = repositories.create_group(group).await?;

    info!(
        target = "yatube::cli::groups",
        group_id = %group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<(HttpState, AdminState), AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let blobs: Arc<dyn BlobStore> = Arc::new(
        FsBlobStore::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
        settings.site.page_size.get(),
    ));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let posts = Arc::new(PostService::new(
        posts_repo,
        posts_write_repo,
        groups_repo,
        comments_repo,
        blobs.clone(),
    ));
    let viewers = Arc::new(ViewerService::new(users_repo));
    let chrome = Arc::new(ChromeService::new(settings.site.title.clone()));

    let cache_config = PageCacheConfig::from(&settings.cache);
    let cache = cache_config
        .enabled
        .then(|| PageCacheState::new(cache_config));

    let upload_limit_bytes =
        usize::try_from(settings.uploads.max_request_bytes.get()).unwrap_or(usize::MAX);

    let http_state = HttpState {
        feed,
        follows,
        posts,
        viewers,
        chrome,
        blobs,
        cache: cache.clone(),
        auth: AuthPolicy::from(&settings.auth),
        upload_limit_bytes,
    };
    let admin_state = AdminState {
        health: health_repo,
        cache,
    };

    Ok((http_state, admin_state))
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "yatube::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for(shutdown_rx));

    let grace = settings.server.graceful_shutdown;
    let servers = async { try_join!(public_server, admin_server) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = signal::ctrl_c() => {
            info!(target = "yatube::serve", "shutdown requested");
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(grace, &mut servers).await {
                Ok(result) => {
                    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
                }
                Err(_) => warn!(
                    target = "yatube::serve",
                    grace_seconds = grace.as_secs(),
                    "graceful shutdown timed out"
                ),
            }
        }
    }

    Ok(())
}

async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
