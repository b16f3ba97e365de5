use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{BoundingRect, TaskInput};
use crate::output::{self, Format};
use crate::store::repo::Project;

pub struct AddArgs {
    pub title: String,
    pub comment: String,
    pub selector: String,
    pub rect: Option<String>,
    pub screenshot: Option<String>,
    pub id: Option<String>,
}

/// Parse `x,y,w,h`.
pub fn parse_rect(raw: &str) -> Result<BoundingRect> {
    let parts = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Validation(format!("rect '{raw}': {e}")))?;
    let &[x, y, w, h] = &parts[..] else {
        return Err(Error::Validation(format!(
            "rect '{raw}' must have four values: x,y,w,h"
        )));
    };
    Ok(BoundingRect { x, y, w, h })
}

pub fn run(root: &Path, args: AddArgs, format: Format) -> Result<()> {
    let mut input = TaskInput::new(args.title, args.comment, args.selector);
    if let Some(raw) = args.rect.as_deref() {
        input = input.with_rect(parse_rect(raw)?);
    }
    if let Some(path) = args.screenshot {
        input = input.with_screenshot(path);
    }
    if let Some(id) = args.id {
        input = input.with_id(id);
    }

    let mut project = Project::open(root)?;
    let task = project.store.add_task_and_save(input)?;
    project.rebuild()?;
    output::print_task(&task, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_numbers() {
        let rect = parse_rect("1, 2.5,30,40").unwrap();
        assert_eq!(rect, BoundingRect { x: 1.0, y: 2.5, w: 30.0, h: 40.0 });
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        assert!(matches!(parse_rect("1,2,3"), Err(Error::Validation(_))));
        assert!(matches!(parse_rect("1,2,3,x"), Err(Error::Validation(_))));
    }
}
