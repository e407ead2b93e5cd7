use apollo_compiler::collections::IndexSet;
use apollo_compiler::executable::OperationType;
use apollo_compiler::name;
use apollo_compiler::parser::Parser;
use apollo_response_shapes::Condition;
use apollo_response_shapes::FieldSetCondition;
use apollo_response_shapes::ShapeField;
use apollo_response_shapes::ShapeOptions;
use apollo_response_shapes::ShapeSchema;
use apollo_response_shapes::ShapedDocument;
use apollo_response_shapes::Shapes;
use apollo_response_shapes::shape_document;
use insta::assert_snapshot;
use pretty_assertions::assert_eq;

const STARWARS: &str = r#"
    type Query {
      hero: Character
      droid(id: ID!): Droid
      search: SearchResult
    }
    union SearchResult = Human | Droid
    interface Character {
      id: ID!
      name: String!
      friends: [Character]
    }
    type Human implements Character {
      id: ID!
      name: String!
      friends: [Character]
      height: Float
    }
    type Droid implements Character {
      id: ID!
      name: String!
      friends: [Character]
      primaryFunction: String
    }
    type Wookiee implements Character {
      id: ID!
      name: String!
      friends: [Character]
      homePlanet: String
    }
"#;

fn shape(document_text: &str) -> ShapedDocument {
    let (schema, document) = Parser::new()
        .parse_mixed_validate(format!("{STARWARS} {document_text}"), "document.graphql")
        .unwrap();
    let schema = ShapeSchema::new(schema);
    shape_document(&schema, &document, &ShapeOptions::default()).unwrap()
}

/// The shapes nested under the first root field of the first operation.
fn root_field_shapes(document_text: &str) -> Shapes {
    let shaped = shape(document_text);
    shaped.operations[0].shapes.field_sets[0].fields[0]
        .shapes
        .clone()
        .unwrap()
}

#[test]
fn unconditional_field_yields_one_field_set() {
    let shapes = root_field_shapes("{ hero { id } }");
    assert_eq!(shapes.field_sets.len(), 1);
    assert!(shapes.field_sets[0].is_base(&name!("Character")));
    let id = shapes.field_sets[0].field("id").unwrap();
    assert!(!id.can_be_skipped);
    assert!(!id.is_nullable());
}

#[test]
fn include_directive_makes_the_field_skippable_without_new_shapes() {
    let shapes =
        root_field_shapes("query($a: Boolean!) { hero { id name @include(if: $a) } }");
    assert_eq!(shapes.field_sets.len(), 1);
    let name = shapes.field_sets[0].field("name").unwrap();
    assert!(name.can_be_skipped);
    // Declared `String!`, but the directive can remove it at runtime.
    assert!(name.is_nullable());
    assert_eq!(
        name.condition,
        Condition::Type(name!("Character")).and(Condition::Variable(name!("a")))
    );
}

#[test]
fn nested_selections_nest_shapes() {
    let shaped = shape("{ hero { id name } }");
    assert_snapshot!(&shaped.operations[0].shapes, @r###"
    {
      common: hero
      [Query] {
        hero: Character if Query {
          common: id, name
          [Character] {
            id: ID! if Character
            name: String! if Character
          }
        }
      }
    }
    "###);
}

#[test]
fn interface_fragments_partition_by_concrete_type() {
    let query = "{
        hero {
          id
          ... on Human { height }
          ... on Droid { primaryFunction }
        }
    }";
    let shapes = root_field_shapes(query);
    // Wookiee selects no extra fields, so it shares the base shape.
    assert_eq!(shapes.field_sets.len(), 3);
    assert!(shapes.field_sets[2].is_base(&name!("Character")));

    let shaped = shape(query);
    assert_snapshot!(&shaped.operations[0].shapes, @r###"
    {
      common: hero
      [Query] {
        hero: Character if Query {
          common: id
          [Character ∧ Human] {
            id: ID! if Character
            height: Float if (Character ∧ Human)
          }
          [Character ∧ Droid] {
            id: ID! if Character
            primaryFunction: String if (Character ∧ Droid)
          }
          [Character] {
            id: ID! if Character
          }
        }
      }
    }
    "###);
}

#[test]
fn sibling_fragments_on_one_type_condition_merge() {
    let shaped = shape("{ hero { ... on Human { name } ... on Human { height } } }");
    assert_snapshot!(&shaped.operations[0].shapes, @r###"
    {
      common: hero
      [Query] {
        hero: Character if Query {
          [Character ∧ Human] {
            name: String! if (Character ∧ Human)
            height: Float if (Character ∧ Human)
          }
          [Character] {}
        }
      }
    }
    "###);
}

#[test]
fn conditional_fragment_spread_splits_shapes() {
    let query = "query($withDetails: Boolean!) {
        hero {
          id
          ...heroDetails @include(if: $withDetails)
        }
    }
    fragment heroDetails on Character {
      id
      name
      friends { id }
    }";
    let shapes = root_field_shapes(query);
    assert_eq!(shapes.field_sets.len(), 2);
    assert!(shapes.field_sets[0].is_base(&name!("Character")));
    assert!(shapes.field_sets[0].implemented_fragments.is_empty());
    assert!(!shapes.field_sets[1].is_base(&name!("Character")));
    assert_eq!(
        shapes.field_sets[1].implemented_fragments,
        [name!("heroDetails")]
    );

    let shaped = shape(query);
    assert_snapshot!(&shaped.operations[0].shapes, @r###"
    {
      common: hero
      [Query] {
        hero: Character if Query {
          common: id
          [Character] {
            id: ID! if Character
          }
          [Character ∧ $withDetails] implements heroDetails {
            id: ID! if (Character ∨ (Character ∧ $withDetails))
            name: String! if (Character ∧ $withDetails)
            friends: [Character] if (Character ∧ $withDetails) {
              common: id
              [Character] {
                id: ID! if Character
              }
            }
          }
        }
      }
    }
    "###);
}

#[test]
fn conditional_spread_collapses_within_each_partition() {
    // `$extra` doubles every partition cell, but both halves select the same
    // fields, so each partition folds back to a single unconditional shape.
    let shapes = root_field_shapes(
        "query($extra: Boolean!) {
            hero {
              id
              ... on Human { height }
              ...extras @include(if: $extra)
            }
        }
        fragment extras on Character { id }",
    );
    assert_eq!(shapes.field_sets.len(), 2);
    let human = &shapes.field_sets[0];
    assert_eq!(
        human.conditions,
        [FieldSetCondition {
            type_conditions: IndexSet::from_iter([name!("Character"), name!("Human")]),
            variables: IndexSet::default(),
        }]
    );
    assert_eq!(human.implemented_fragments, [name!("extras")]);
    assert!(human.field("height").is_some());
    let base = &shapes.field_sets[1];
    assert!(base.is_base(&name!("Character")));
    assert_eq!(base.implemented_fragments, [name!("extras")]);
    assert_eq!(
        shapes
            .common_fields
            .iter()
            .map(ShapeField::response_name)
            .collect::<Vec<_>>(),
        ["id"]
    );
}

#[test]
fn typename_is_common_across_union_members() {
    let shapes = root_field_shapes("{ search { __typename ... on Human { height } } }");
    assert_eq!(shapes.field_sets.len(), 2);
    assert_eq!(shapes.common_fields.len(), 1);
    assert_eq!(shapes.common_fields[0].response_name(), "__typename");
    assert_eq!(shapes.common_fields[0].ty().to_string(), "String!");
    assert!(shapes.field_sets[1].is_base(&name!("SearchResult")));
}

#[test]
fn aliases_key_the_response_names() {
    let shapes = root_field_shapes("{ hero { nickname: name name } }");
    assert_eq!(shapes.field_sets.len(), 1);
    let nickname = shapes.field_sets[0].field("nickname").unwrap();
    assert_eq!(nickname.name, name!("name"));
    assert_eq!(nickname.response_name(), "nickname");
    assert!(shapes.field_sets[0].field("name").is_some());
    assert_eq!(shapes.common_fields.len(), 2);
}

#[test]
fn object_rooted_selections_have_a_single_partition() {
    let shaped = shape("query($id: ID!) { droid(id: $id) { primaryFunction } }");
    let operation = &shaped.operations[0];
    assert_eq!(operation.operation_type, OperationType::Query);
    assert_eq!(operation.root_type, name!("Query"));
    let droid = operation.shapes.field_sets[0].fields[0]
        .shapes
        .as_ref()
        .unwrap();
    assert_eq!(droid.field_sets.len(), 1);
    assert!(droid.field_sets[0].is_base(&name!("Droid")));
}

#[test]
fn fragment_definitions_get_their_own_shapes() {
    let shaped = shape(
        "{ hero { ...heroDetails } }
         fragment heroDetails on Character {
           id
           name
           friends { id }
         }",
    );
    assert_eq!(shaped.fragments.len(), 1);
    let fragment = &shaped.fragments[0];
    assert_eq!(fragment.name, name!("heroDetails"));
    assert_eq!(fragment.type_condition, name!("Character"));
    assert!(fragment.inferred_variables.is_empty());
    assert!(fragment.source.starts_with("fragment heroDetails on Character"));
    assert_eq!(fragment.shapes.field_sets.len(), 1);
    assert_eq!(fragment.shapes.common_fields.len(), 3);
}

#[test]
fn operation_source_includes_the_fragments_it_spreads() {
    let shaped = shape(
        "query Hero { hero { ...heroDetails } }
         fragment heroDetails on Character { id }",
    );
    let source = &shaped.operations[0].source_with_fragments;
    assert!(source.starts_with("query Hero"));
    assert!(source.contains("fragment heroDetails on Character"));
}
