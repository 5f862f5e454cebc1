//! Titles, branch names and rendered bodies for the two kinds of change request.
//!
//! Bodies are Tera templates rendered from a serialized context.

use super::ChangeRequestSpec;
use crate::image::ImageTag;
use crate::manifest::DependencyManifest;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tera::{Context as TeraContext, Tera};

const RECIPE_BODY: &str = r"## Automated JAR Addition

This PR was automatically generated by the CI pipeline.

### New JARs to be added:

| JAR Name | Description | URL |
|----------|-------------|-----|
{% for jar in jars -%}
| {{ jar.name }} | {{ jar.description }} | [Link]({{ jar.url }}) |
{% endfor %}
{%- if drift %}
### Not changed

These JARs are already in the recipe with a different URL and were left as they are:

{% for d in drift -%}
- `{{ d.name }}`: recipe has {{ d.recipe_url }}, manifest asks for {{ d.manifest_url }}
{% endfor %}
{%- endif %}
### Checklist
- [ ] JAR URL is valid and accessible
- [ ] JAR is compatible with NiFi version
- [ ] Security review completed (if required)

### After Approval
Once this PR is merged, the pipeline will automatically:
1. Build the new Docker image
2. Push to the registry
3. Create a PR to update the deployment descriptor
";

const DESCRIPTOR_BODY: &str = r"## Automated Task Definition Update

This PR was automatically generated after a successful Docker image build.

### Changes
- **Image:** `{{ image }}`
- **Previous image tag:** `{{ previous_tag }}`
- **New image tag:** `{{ new_tag }}`

### After Approval
Once this PR is merged:
1. Run `terraform plan` to verify the changes
2. Apply the Terraform changes to update the service

### Rollback
If issues occur, revert this PR or set the image tag back to `{{ previous_tag }}`.
";

#[derive(Serialize)]
struct JarRow<'a> {
    name: &'a str,
    description: &'a str,
    url: &'a str,
}

fn render(name: &str, template: &str, context: &TeraContext) -> Result<String> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, template)
        .with_context(|| format!("Invalid {name} template"))?;
    tera.render(name, context).with_context(|| format!("Failed to render {name}"))
}

/// Deterministic title for a recipe change: the sorted dependency names.
#[must_use]
pub fn recipe_title(names: &[&str]) -> String {
    let mut names = names.to_vec();
    names.sort_unstable();
    format!("[Auto] Add JAR(s): {}", names.join(", "))
}

/// Deterministic title for a descriptor change.
#[must_use]
pub fn descriptor_title(tag: &ImageTag) -> String {
    format!("[Auto] Update NiFi Docker image to {tag}")
}

/// Branch-safe slug of the dependency names, without the artifact extension.
fn names_slug(names: &[&str]) -> String {
    let mut names = names.to_vec();
    names.sort_unstable();
    let joined = names
        .iter()
        .map(|n| n.trim_end_matches(crate::constants::ARTIFACT_EXTENSION))
        .collect::<Vec<_>>()
        .join("-");

    let mut slug = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c.is_ascii_alphanumeric() || c == '.' {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches(['-', '.']);
    slug.chars().take(60).collect::<String>().trim_end_matches(['-', '.']).to_string()
}

/// Change request adding fetch directives to the recipe.
///
/// `new` must be non-empty and sorted by name; `recipe_path` is repository-relative.
pub fn recipe_change_request(
    new: &[DependencyManifest],
    drift: &[crate::recipe::UrlDrift],
    recipe_path: &str,
    patched: String,
    labels: &[String],
) -> Result<ChangeRequestSpec> {
    let names: Vec<&str> = new.iter().map(|m| m.name.as_str()).collect();

    let rows: Vec<JarRow<'_>> = new
        .iter()
        .map(|m| JarRow {
            name: &m.name,
            description: if m.description.is_empty() { "N/A" } else { &m.description },
            url: &m.source_url,
        })
        .collect();
    let mut context = TeraContext::new();
    context.insert("jars", &rows);
    context.insert("drift", drift);

    Ok(ChangeRequestSpec {
        title: recipe_title(&names),
        branch_hint: format!("auto/add-jars-{}", names_slug(&names)),
        files: BTreeMap::from([(recipe_path.to_string(), patched)]),
        body: render("recipe pull request body", RECIPE_BODY, &context)?,
        labels: labels.to_vec(),
        commit_message: format!("Add new JAR(s): {} [skip ci]", names.join(", ")),
    })
}

/// Change request pointing the deployment descriptor at a new image tag.
pub fn descriptor_change_request(
    image: &str,
    previous_tag: &str,
    new_tag: &ImageTag,
    descriptor_path: &str,
    rewritten: String,
    labels: &[String],
) -> Result<ChangeRequestSpec> {
    let mut context = TeraContext::new();
    context.insert("image", image);
    context.insert("previous_tag", previous_tag);
    context.insert("new_tag", new_tag.as_str());

    Ok(ChangeRequestSpec {
        title: descriptor_title(new_tag),
        branch_hint: format!("auto/update-task-def-{new_tag}"),
        files: BTreeMap::from([(descriptor_path.to_string(), rewritten)]),
        body: render("descriptor pull request body", DESCRIPTOR_BODY, &context)?,
        labels: labels.to_vec(),
        commit_message: format!("Update NiFi image to {new_tag}"),
    })
}
