mod support;

use std::sync::Arc;

use chrono::Utc;
use mailcraft::email::blocks::TextContent;
use mailcraft::email::{
    render, Block, BlockContent, LayoutDocument, RevisionId, RevisionStore, TemplateDraft,
    TemplateService, TemplateServiceError, TemplateUpdate, UserId, VariableMap,
};
use support::{company, greeting_layout, MemoryTemplateStore, StaticVariables};

struct Fixture {
    service: TemplateService<MemoryTemplateStore>,
    revisions: Arc<RevisionStore>,
    variables: Arc<StaticVariables>,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryTemplateStore::default());
    let revisions = Arc::new(RevisionStore::new());
    let variables = Arc::new(StaticVariables::new(VariableMap::from_pairs([(
        "COMPANY_NAME",
        "Acme",
    )])));
    let service = TemplateService::new(store, revisions.clone(), variables.clone());
    Fixture {
        service,
        revisions,
        variables,
    }
}

fn draft() -> TemplateDraft {
    TemplateDraft {
        company_id: company(),
        name: "Seasonal promo".to_string(),
        subject: "Winter tires are in".to_string(),
        preview_text: "Beat the first snow".to_string(),
        layout: greeting_layout(),
        created_by: UserId("user-1".to_string()),
    }
}

fn text_layout(text: &str) -> LayoutDocument {
    LayoutDocument::new(vec![Block::new(
        1,
        BlockContent::Text(TextContent {
            text: text.to_string(),
        }),
    )])
}

#[test]
fn every_save_appends_one_revision() {
    let fx = fixture();
    let template = fx.service.create(draft(), Utc::now()).expect("create");
    assert_eq!(fx.revisions.list(&template.id).len(), 1);

    fx.service
        .save(
            &template.id,
            TemplateUpdate {
                name: template.name.clone(),
                subject: template.subject.clone(),
                preview_text: template.preview_text.clone(),
                layout: text_layout("Second draft"),
                edited_by: UserId("user-2".to_string()),
            },
            Utc::now(),
        )
        .expect("save");

    let history = fx.revisions.list(&template.id);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].revision_id, RevisionId(1));
    assert_eq!(history[1].revision_id, RevisionId(2));
}

#[test]
fn restore_round_trips_the_original_compiled_output() {
    let fx = fixture();
    let template = fx.service.create(draft(), Utc::now()).expect("create");
    let original = fx
        .revisions
        .fetch(&template.id, RevisionId(1))
        .expect("first revision");

    fx.service
        .save(
            &template.id,
            TemplateUpdate {
                name: template.name.clone(),
                subject: template.subject.clone(),
                preview_text: template.preview_text.clone(),
                layout: text_layout("Replaced everything"),
                edited_by: UserId("user-2".to_string()),
            },
            Utc::now(),
        )
        .expect("overwrite");

    let restored = fx
        .service
        .restore(
            &template.id,
            RevisionId(1),
            UserId("user-2".to_string()),
            Utc::now(),
        )
        .expect("restore");

    // Variables did not change, so the restored compile matches the snapshot.
    let compiled = restored.compiled.expect("compiled cache");
    assert_eq!(compiled.html, original.html);
    assert_eq!(compiled.text, original.text);
    // The restore itself is a save, producing a third revision.
    assert_eq!(fx.revisions.list(&template.id).len(), 3);
}

#[test]
fn restore_renders_against_current_variables_not_snapshot_ones() {
    let fx = fixture();
    let template = fx.service.create(draft(), Utc::now()).expect("create");

    fx.service
        .save(
            &template.id,
            TemplateUpdate {
                name: template.name.clone(),
                subject: template.subject.clone(),
                preview_text: template.preview_text.clone(),
                layout: text_layout("Interim"),
                edited_by: UserId("user-1".to_string()),
            },
            Utc::now(),
        )
        .expect("overwrite");

    // The company rebrands between the snapshot and the restore.
    fx.variables
        .replace(VariableMap::from_pairs([("COMPANY_NAME", "Apex Motors")]));

    let restored = fx
        .service
        .restore(
            &template.id,
            RevisionId(1),
            UserId("user-1".to_string()),
            Utc::now(),
        )
        .expect("restore");

    let html = restored.compiled.expect("compiled cache").html;
    assert!(html.contains("Hi Apex Motors"));
    assert!(!html.contains("Hi Acme"));
}

#[test]
fn restoring_a_foreign_revision_is_not_found() {
    let fx = fixture();
    let template = fx.service.create(draft(), Utc::now()).expect("create");

    let error = fx
        .service
        .restore(
            &template.id,
            RevisionId(42),
            UserId("user-1".to_string()),
            Utc::now(),
        )
        .expect_err("revision 42 does not exist");
    assert!(matches!(error, TemplateServiceError::RevisionNotFound));

    // No mutation: the live layout still renders the latest save.
    let live = fx.service.get(&template.id).expect("template still loads");
    assert_eq!(
        live.compiled.expect("compiled cache").html,
        render(&live.layout, &VariableMap::from_pairs([("COMPANY_NAME", "Acme")])).html
    );
}

#[test]
fn revision_history_is_never_rewritten_by_later_saves() {
    let fx = fixture();
    let template = fx.service.create(draft(), Utc::now()).expect("create");
    let first = fx
        .revisions
        .fetch(&template.id, RevisionId(1))
        .expect("first revision");

    for round in 0..3 {
        fx.service
            .save(
                &template.id,
                TemplateUpdate {
                    name: template.name.clone(),
                    subject: template.subject.clone(),
                    preview_text: template.preview_text.clone(),
                    layout: text_layout(&format!("Draft {round}")),
                    edited_by: UserId("user-1".to_string()),
                },
                Utc::now(),
            )
            .expect("save");
    }

    let unchanged = fx
        .revisions
        .fetch(&template.id, RevisionId(1))
        .expect("first revision still present");
    assert_eq!(unchanged, first);
}
