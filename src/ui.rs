#![forbid(unsafe_code)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use inquire::error::{CustomUserError, InquireError};
use inquire::validator::Validation;
use inquire::{Confirm, Select, Text};

use carsmith::car::cli::describe;
use carsmith::car::{
    extract_one, Catalog, CatalogEditor, CatalogError, CommandError, CommandResult, EditSettings,
    Rendition, RenditionPreview,
};

struct Choice {
    label: String,
    rendition: Rendition,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Info,
    Extract,
    Edit,
    Remove,
    Back,
    Quit,
}

impl Action {
    const ALL: [Action; 6] = [
        Self::Info,
        Self::Extract,
        Self::Edit,
        Self::Remove,
        Self::Back,
        Self::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "Show details",
            Self::Extract => "Extract to a directory",
            Self::Edit => "Replace image",
            Self::Remove => "Remove from catalog",
            Self::Back => "Back to search",
            Self::Quit => "Quit",
        })
    }
}

fn prompt_err(e: InquireError) -> CommandError {
    CommandError::Prompt(e.to_string())
}

/// `Ok(None)` when the user cancels the prompt.
fn cancellable<T>(res: Result<T, InquireError>) -> CommandResult<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(prompt_err(e)),
    }
}

/// Prints a failed catalog action and keeps the browser open. Prompt
/// failures still end the session.
fn reported<T>(res: CommandResult<T>) -> CommandResult<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e @ CommandError::Prompt(_)) => Err(e),
        Err(e) => {
            eprintln!("error: {e}");
            Ok(None)
        }
    }
}

fn replace_image(car: &Path, rendition: &Rendition, image: &Path) -> CommandResult<()> {
    let image = image::open(image).map_err(CatalogError::from)?.to_rgba8();
    let preview = RenditionPreview::Image(Arc::new(image));
    CatalogEditor::new(EditSettings::default()).edit(rendition, car, &preview)?;
    Ok(())
}

fn validate_car(p: &str) -> Result<Validation, CustomUserError> {
    if !Path::new(p.trim()).is_file() {
        return Ok(Validation::Invalid("Not a file".into()));
    }
    Ok(Validation::Valid)
}

pub fn run() -> CommandResult<()> {
    println!("carsmith browser\n");

    let Some(car) = cancellable(
        Text::new("Catalog file")
            .with_default("./Assets.car")
            .with_validator(validate_car)
            .prompt(),
    )?
    else {
        return Ok(());
    };
    let car = PathBuf::from(car.trim());

    loop {
        let (_, collection) = Catalog::open(&car)?;
        println!("{} rendition(s) in {} group(s)", collection.len(), collection.groups().len());

        let Some(query) = cancellable(Text::new("Search (empty for all)").prompt())? else {
            return Ok(());
        };
        let view = collection.filter(query.trim());
        if view.is_empty() {
            println!("no matches");
            continue;
        }

        let choices: Vec<Choice> = view
            .iter()
            .map(|r| Choice {
                label: format!("[{}] {} @{}x", r.kind(), r.name(), r.scale()),
                rendition: r.clone(),
            })
            .collect();
        let Some(choice) = cancellable(Select::new("Rendition", choices).prompt())? else {
            continue;
        };

        match act(&car, &choice.rendition)? {
            Flow::Continue => {}
            Flow::Quit => return Ok(()),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

fn act(car: &Path, rendition: &Rendition) -> CommandResult<Flow> {
    loop {
        let Some(action) = cancellable(Select::new("Action", Action::ALL.to_vec()).prompt())?
        else {
            return Ok(Flow::Continue);
        };

        match action {
            Action::Info => {
                for (label, value) in describe(rendition) {
                    println!("{label:>16}: {value}");
                }
            }
            Action::Extract => {
                let Some(dir) = cancellable(
                    Text::new("Output directory")
                        .with_default("./extracted")
                        .prompt(),
                )?
                else {
                    continue;
                };
                match reported(
                    extract_one(rendition, Path::new(dir.trim())).map_err(CommandError::from),
                )? {
                    Some(Some(path)) => println!("wrote {}", path.display()),
                    Some(None) => {
                        println!("{} has no pixels or bytes to extract", rendition.name())
                    }
                    None => {}
                }
            }
            Action::Edit => {
                let Some(image) = cancellable(Text::new("Replacement image").prompt())? else {
                    continue;
                };
                if reported(replace_image(car, rendition, Path::new(image.trim())))?.is_none() {
                    continue;
                }
                println!("edited {}", rendition.name());
                return Ok(Flow::Continue);
            }
            Action::Remove => {
                let sure = cancellable(
                    Confirm::new(&format!("Remove {}?", rendition.name()))
                        .with_default(false)
                        .prompt(),
                )?;
                if sure != Some(true) {
                    continue;
                }
                let removed = CatalogEditor::new(EditSettings::default())
                    .remove(rendition, car)
                    .map_err(CommandError::from);
                if reported(removed)?.is_none() {
                    continue;
                }
                println!("removed {}", rendition.name());
                return Ok(Flow::Continue);
            }
            Action::Back => return Ok(Flow::Continue),
            Action::Quit => return Ok(Flow::Quit),
        }
    }
}
