//! Command handlers behind the CLI: each one wires config, session, store and
//! gateway together and prints the result.

use anyhow::{bail, Context, Result};
use shared::{DraftBundle, DraftField, Platform, User};
use std::io::Write;
use std::path::PathBuf;

use crate::auth::{FirestoreDirectory, Session, SessionStore};
use crate::config::Config;
use crate::gateway::{Gateway, HttpGateway};
use crate::history::{self, DashboardStats, HistoryFilter, DASHBOARD_LIMIT};
use crate::store::DraftStore;
use crate::workflow::{CreateEventFlow, DraftEditor, Stage};

/// Everything a command needs, built from the loaded config
pub struct Console {
    config: Config,
    data_dir: PathBuf,
}

impl Console {
    pub fn load() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        let data_dir = config.data_dir()?;
        tracing::debug!("Using data directory {:?}", data_dir);
        Ok(Self { config, data_dir })
    }

    fn store(&self) -> DraftStore {
        DraftStore::new(&self.data_dir)
    }

    fn gateway(&self) -> Result<HttpGateway> {
        Ok(HttpGateway::new(self.config.api.clone())?)
    }

    fn session(&self) -> Result<Session<FirestoreDirectory>> {
        let directory = FirestoreDirectory::new(self.config.directory.clone())?;
        let mut session = Session::new(directory, SessionStore::new(&self.data_dir));
        session.init();
        Ok(session)
    }

    /// The signed-in administrator, or `None` after printing how to log in
    fn require_login(&self) -> Result<Option<User>> {
        let session = self.session()?;
        match session.require_user() {
            Ok(user) => Ok(Some(user.clone())),
            Err(_) => {
                eprintln!("\x1b[33m🔐 Not logged in.\x1b[0m");
                eprintln!("   Run '\x1b[1msamvedana login\x1b[0m' to authenticate.");
                Ok(None)
            }
        }
    }

    fn editor(&self, event_id: &str) -> Result<DraftEditor<HttpGateway>> {
        Ok(DraftEditor::new(self.gateway()?, self.store(), event_id))
    }
}

fn prompt_line(label: &str) -> Result<String> {
    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

// ============================================================================
// Session
// ============================================================================

pub async fn login(console: &Console, mobile: Option<String>, password: Option<String>) -> Result<()> {
    let mut session = console.session()?;
    if let Some(user) = session.user() {
        println!("\x1b[32m✓ Already logged in as {}\x1b[0m", user.creator_label());
        return Ok(());
    }

    let mobile = match mobile {
        Some(m) => m,
        None => prompt_line("Mobile number: ")?,
    };
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ").context("failed to read password")?,
    };

    let user = session.login(&mobile, &password).await?;
    println!();
    println!("\x1b[1;32m✅ Login successful!\x1b[0m");
    println!("\x1b[90mWelcome, {}\x1b[0m", user.creator_label());
    Ok(())
}

pub fn logout(console: &Console) -> Result<()> {
    let mut session = console.session()?;
    session.logout()?;
    println!("\x1b[32m✅ Logged out successfully\x1b[0m");
    Ok(())
}

pub fn whoami(console: &Console) -> Result<()> {
    let session = console.session()?;
    match session.user() {
        Some(user) => {
            println!("\x1b[32m✓ Logged in\x1b[0m");
            println!("Name:   {}", user.name);
            println!("Mobile: {}", user.mobile_number);
            println!("Role:   {}", user.role);
        }
        None => {
            println!("\x1b[33m✗ Not logged in\x1b[0m");
            println!("Run '\x1b[1msamvedana login\x1b[0m' to authenticate");
        }
    }
    Ok(())
}

// ============================================================================
// Dashboard & history
// ============================================================================

pub async fn dashboard(console: &Console) -> Result<()> {
    let Some(user) = console.require_login()? else {
        return Ok(());
    };
    let filter = HistoryFilter {
        limit: DASHBOARD_LIMIT,
        ..Default::default()
    };

    let events = match console.gateway()?.history(&filter.to_query(&chrono::Local::now())).await {
        Ok(response) => response.events,
        Err(e) => {
            tracing::error!("Failed to load recent events: {}", e);
            eprintln!("\x1b[33mCould not load recent events: {}\x1b[0m", e);
            Vec::new()
        }
    };
    let stats = DashboardStats::from_events(&events);

    println!("\x1b[1mWelcome back, {}\x1b[0m", user.creator_label());
    println!();
    println!("  Total Events  {}", stats.total);
    println!("  Published     \x1b[32m{}\x1b[0m", stats.published);
    println!("  In Draft      \x1b[33m{}\x1b[0m", stats.drafts);
    println!();

    if events.is_empty() {
        println!("\x1b[90mNo events yet. Run 'samvedana create' to start.\x1b[0m");
    } else {
        println!("\x1b[1mRecent events\x1b[0m");
        let recent: Vec<_> = events.iter().collect();
        print!("{}", history::render_events(&recent));
    }
    Ok(())
}

pub async fn show_history(console: &Console, filter: HistoryFilter) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }

    let query = filter.to_query(&chrono::Local::now());
    let response = console.gateway()?.history(&query).await?;
    let events = filter.apply(&response.events);

    println!("\x1b[1mEvents ({})\x1b[0m", events.len());
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        println!("\x1b[90mShowing results for \"{}\"\x1b[0m", term);
    }
    println!();

    if events.is_empty() {
        if filter.search.is_some() {
            println!("No events found");
            println!("\x1b[90mTry adjusting your search or filters\x1b[0m");
        } else {
            println!("No events yet");
            println!("\x1b[90mRun 'samvedana create' to create your first event\x1b[0m");
        }
    } else {
        print!("{}", history::render_events(&events));
    }
    Ok(())
}

// ============================================================================
// Event creation
// ============================================================================

pub struct CreateArgs {
    pub title: String,
    pub description: String,
    pub date_time: String,
    pub images: Vec<PathBuf>,
}

pub async fn create(console: &Console, args: CreateArgs) -> Result<()> {
    let Some(user) = console.require_login()? else {
        return Ok(());
    };

    let mut flow = CreateEventFlow::new(console.gateway()?, console.store(), console.config.images.clone())
        .with_stage_observer(|stage| {
            if stage != Stage::Idle {
                eprintln!("\x1b[36m⏳ {}\x1b[0m", stage);
            }
        });
    flow.form.title = args.title;
    flow.form.description = args.description;
    flow.form.date_time = args.date_time;

    for rejection in flow.form.images.add_files(args.images.as_slice()) {
        eprintln!("\x1b[33m⚠ {}\x1b[0m", rejection);
    }
    for preview in flow.form.images.previews() {
        println!("\x1b[90m🖼  {} ({} bytes)\x1b[0m", preview.file_name(), preview.size);
    }

    let created = flow.submit(&user).await?;
    println!();
    println!("\x1b[1;32m✅ Event created: {}\x1b[0m", created.event_id);
    for url in &created.image_urls {
        println!("   \x1b[4m{}\x1b[0m", url);
    }
    println!();

    show_drafts(console, &created.event_id).await
}

// ============================================================================
// Drafts
// ============================================================================

fn render_bundle(bundle: &DraftBundle, visible: &[Platform], selected: &[Platform], dirty: bool) -> String {
    let mut out = format!("\x1b[1m{}\x1b[0m  \x1b[90m{}\x1b[0m", bundle.display_name(), bundle.event_id);
    if dirty {
        out.push_str("  \x1b[33m(unsaved changes)\x1b[0m");
    }
    out.push('\n');

    for platform in visible {
        let Some(draft) = bundle.draft(*platform) else { continue };
        let mark = if selected.contains(platform) { "[x]" } else { "[ ]" };
        out.push_str(&format!("\n{} \x1b[1;36m{}\x1b[0m\n", mark, platform));
        for field in [
            DraftField::Text,
            DraftField::Hashtags,
            DraftField::SeoKeywords,
            DraftField::AltText,
            DraftField::Cta,
        ] {
            let value = draft.field(field);
            if !value.is_empty() || field == DraftField::Text {
                out.push_str(&format!("  \x1b[90m{}:\x1b[0m {}\n", field, value));
            }
        }
    }

    if !bundle.uploaded_images.is_empty() {
        out.push_str("\nImages:\n");
        for url in &bundle.uploaded_images {
            out.push_str(&format!("  \x1b[4m{}\x1b[0m\n", url));
        }
    }
    out
}

fn print_editor(editor: &DraftEditor<HttpGateway>) {
    if let Some(bundle) = editor.bundle() {
        print!(
            "{}",
            render_bundle(bundle, &editor.visible_platforms(), &editor.selected(), editor.is_dirty())
        );
    }
}

pub async fn show_drafts(console: &Console, event_id: &str) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }
    let mut editor = console.editor(event_id)?;
    editor.load().await?;
    print_editor(&editor);
    Ok(())
}

pub fn list_drafts(console: &Console) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }
    let store = console.store();
    let ids = store.list()?;
    if ids.is_empty() {
        println!("No cached drafts");
        return Ok(());
    }
    for id in ids {
        match store.get(&id) {
            Some(bundle) => println!(
                "{}  {}  \x1b[90m{} platform(s), {} image(s)\x1b[0m",
                id,
                bundle.display_name(),
                bundle.platforms().len(),
                bundle.uploaded_images.len()
            ),
            None => println!("{}  \x1b[33m(unreadable)\x1b[0m", id),
        }
    }
    Ok(())
}

/// Parse `platform.field=value`
pub fn parse_assignment(raw: &str) -> Result<(Platform, DraftField, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Expected platform.field=value, got {}", raw);
    };
    let Some((platform, field)) = key.split_once('.') else {
        bail!("Expected platform.field=value, got {}", raw);
    };
    Ok((platform.parse()?, field.parse()?, value.to_string()))
}

pub async fn edit_drafts(console: &Console, event_id: &str, assignments: &[String], save: bool) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }
    let edits = assignments
        .iter()
        .map(|raw| parse_assignment(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut editor = console.editor(event_id)?;
    editor.load().await?;
    for (platform, field, value) in edits {
        editor.edit(platform, field, value)?;
    }
    if save {
        editor.save()?;
        println!("\x1b[32m✅ Drafts saved\x1b[0m");
    }
    print_editor(&editor);
    Ok(())
}

pub async fn revert_drafts(console: &Console, event_id: &str) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }
    let mut editor = console.editor(event_id)?;
    editor.revert().await?;
    println!("\x1b[32m✅ Drafts reverted\x1b[0m");
    print_editor(&editor);
    Ok(())
}

pub async fn publish_drafts(console: &Console, event_id: &str, platforms: &[Platform], assume_yes: bool) -> Result<()> {
    if console.require_login()?.is_none() {
        return Ok(());
    }
    let mut editor = console.editor(event_id)?;
    editor.load().await?;
    if !platforms.is_empty() {
        editor.select_platforms(platforms)?;
    }

    let names: Vec<&str> = editor.selected().iter().map(|p| p.as_str()).collect();
    eprintln!("\x1b[36m⏳ Publishing to {}...\x1b[0m", names.join(", "));
    let response = editor.publish().await?;

    println!();
    println!("\x1b[1;32m🎉 Published successfully!\x1b[0m");
    if let Some(message) = &response.message {
        println!("{}", message);
    }
    for platform in &response.published_platforms {
        match response.links.get(platform) {
            Some(link) => println!("  {}: \x1b[4m{}\x1b[0m", platform, link),
            None => println!("  {}", platform),
        }
    }

    if !assume_yes {
        prompt_line("\nPress Enter to continue...")?;
    }
    editor.acknowledge_publish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PlatformDraft;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_list_drafts_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file as data dir: reading the draft store from it would fail
        let data_dir = dir.path().join("not-a-dir");
        std::fs::write(&data_dir, "").unwrap();
        let console = Console {
            config: Config::default(),
            data_dir,
        };

        assert!(console.require_login().unwrap().is_none());
        assert!(console.store().list().is_err());
        list_drafts(&console).unwrap();
    }

    #[test]
    fn test_parse_assignment() {
        let (platform, field, value) = parse_assignment("twitter.hashtags=#run #5k").unwrap();
        assert_eq!(platform, Platform::Twitter);
        assert_eq!(field, DraftField::Hashtags);
        assert_eq!(value, "#run #5k");

        let (_, _, value) = parse_assignment("facebook.text=a=b").unwrap();
        assert_eq!(value, "a=b");

        assert!(parse_assignment("facebook.text").is_err());
        assert!(parse_assignment("text=hello").is_err());
        assert!(parse_assignment("myspace.text=x").is_err());
        assert!(parse_assignment("facebook.colour=x").is_err());
    }

    #[test]
    fn test_render_bundle_marks_selection() {
        let mut drafts = BTreeMap::new();
        drafts.insert(
            Platform::Facebook,
            Arc::new(PlatformDraft {
                text: "Join us".into(),
                hashtags: "#give".into(),
                ..Default::default()
            }),
        );
        drafts.insert(Platform::Twitter, Arc::new(PlatformDraft::default()));
        let bundle = DraftBundle {
            title: Some("Fundraiser".into()),
            platform_drafts: Some(drafts),
            uploaded_images: vec!["https://cdn/a.png".into()],
            ..DraftBundle::skeleton("ev1")
        };

        let out = render_bundle(
            &bundle,
            &[Platform::Facebook, Platform::Twitter],
            &[Platform::Facebook],
            true,
        );
        assert!(out.contains("Fundraiser"));
        assert!(out.contains("(unsaved changes)"));
        assert!(out.contains("[x] \x1b[1;36mfacebook"));
        assert!(out.contains("[ ] \x1b[1;36mtwitter"));
        assert!(out.contains("hashtags:\x1b[0m #give"));
        assert!(!out.contains("cta:"));
        assert!(out.contains("https://cdn/a.png"));
    }
}
