use opensees_writer::models::{ConditionAssignment, WriteRequest};
use opensees_writer::{EmitError, ModelDocument, TclWriter, WriterConfig};
use std::fs;

fn portal_frame() -> ModelDocument {
    let request: WriteRequest = serde_json::from_str(include_str!("data/portal_frame.json")).unwrap();
    request.model
}

fn writer() -> TclWriter {
    TclWriter::new(WriterConfig::default())
}

const CDATA: &str = "\
*LOCAL_AXES
1
2 1.0 0.0 0.0 0.0 1.0 0.0
*BEAM_PROFILE_ASSIGNMENT
1
2 31 rect 0.3 0.3
";

#[test]
fn partitioned_portal_frame() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("run.mpco.cdata"), CDATA).unwrap();

    let report = writer().write_model(&portal_frame(), dir.path()).unwrap();
    assert_eq!(report.process_count, 2);
    assert_eq!(report.synthesized_nodes, 2);
    assert_eq!(report.synthesized_elements, 2);
    assert_eq!(report.files.len(), 2);

    let definitions = fs::read_to_string(dir.path().join("definitions.tcl")).unwrap();
    assert!(definitions.starts_with("# Materials\nuniaxialMaterial Elastic 10 1000.0 0.0 1000.0\n"));
    assert!(definitions.contains("section Elastic 11 30000000.0 0.09 0.000675 0.000675 12500000.0 0.00114\n"));
    assert!(definitions.ends_with("timeSeries Linear 12 -factor 1.0\n"));

    let main = fs::read_to_string(dir.path().join("main.tcl")).unwrap();
    let expected = "\
# OpenSees model written by opensees-writer
# process count: 2

# Nodes
if {$STKO_VAR_process_id == 0} {

\tmodel basic -ndm 3 -ndf 6
\tsource definitions.tcl
\tnode 1 0.0 0.0 0.0
\tnode 2 0.0 0.0 3.0
\tnode 3 4.0 0.0 3.0
} elseif {$STKO_VAR_process_id == 1} {

\tmodel basic -ndm 3 -ndf 6
\tsource definitions.tcl
\tnode 3 4.0 0.0 3.0
\tnode 4 4.0 0.0 0.0
}

# Elements
if {$STKO_VAR_process_id == 0} {
\tgeomTransf Linear 51 0.0 1.0 0.0
\telement elasticBeamColumn 1 1 2 11 51
} elseif {$STKO_VAR_process_id == 1} {
\tgeomTransf Linear 51 0.0 1.0 0.0
\telement elasticBeamColumn 3 3 4 11 51
}
if {$STKO_VAR_process_id == 0} {
\tgeomTransf Linear 52 0.0 1.0 0.0
\tnode 5 0.0 0.0 3.0
\tnode 6 4.0 0.0 3.0
\telement zeroLength 4 2 5 -mat 10 -dir 2
\tequalDOF 2 5 1 3 4 5 6
\telement elasticBeamColumn 2 5 6 11 52
\telement zeroLength 5 6 3 -mat 10 -dir 2
\tequalDOF 3 6 1 3 4 5 6
}

# Restraints
if {$STKO_VAR_process_id == 0} {
\tfix 1 1 1 1 1 1 1
} elseif {$STKO_VAR_process_id == 1} {
\tfix 4 1 1 1 1 1 1
}

# Nodal masses
if {$STKO_VAR_process_id == 0} {
\tmass 2 2.0 2.0 2.0 0.0 0.0 0.0
\tmass 3 2.0 2.0 2.0 0.0 0.0 0.0
}

# Load patterns
pattern Plain 50 12 {
\tif {$STKO_VAR_process_id == 0} {
\t\tload 2 10.0 0.0 0.0 0.0 0.0 0.0
\t}
}
";
    assert_eq!(main, expected);

    let cdata = fs::read_to_string(dir.path().join("run.mpco.cdata")).unwrap();
    assert_eq!(
        cdata,
        "\
*LOCAL_AXES
3
2 1.0 0.0 0.0 0.0 1.0 0.0
4 1.0 0.0 0.0 0.0 1.0 0.0
5 1.0 0.0 0.0 0.0 1.0 0.0
*BEAM_PROFILE_ASSIGNMENT
3
2 31 rect 0.3 0.3
4 51 rect 0.3 0.3
5 51 rect 0.3 0.3
"
    );
    assert_eq!(report.cdata.total_appended(), 4);
}

fn condition(json: &str) -> ConditionAssignment {
    serde_json::from_str(json).unwrap()
}

/// Bodies of every `pid` branch between `banner` and the next banner.
fn branch(main: &str, banner: &str, pid: usize) -> String {
    let start = main.find(banner).unwrap() + banner.len();
    let section = &main[start..];
    let section = &section[..section.find("\n# ").unwrap_or(section.len())];
    let open = format!("{{$STKO_VAR_process_id == {}}} {{\n", pid);
    section
        .match_indices(&open)
        .map(|(at, _)| {
            let body = &section[at + open.len()..];
            &body[..body.find('}').unwrap()]
        })
        .collect()
}

#[test]
fn explicit_node_partition_declares_node_where_used() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = portal_frame();
    // node 2 only touches elements of partition 0 but is owned by 1
    doc.partitions.node_partition.insert(2, 1);
    doc.conditions.push(condition(
        r#"{ "xobject": { "id": 43, "namespace": "conditions.restraint", "name": "fix",
                          "attributes": { "dofs": { "index_vector": [1, 2, 3] } } },
             "targets": { "nodes": [3] } }"#,
    ));
    doc.conditions.push(condition(
        r#"{ "xobject": { "id": 44, "namespace": "conditions.constraints", "name": "equalDOF",
                          "attributes": { "dofs": { "index_vector": [1, 2, 3] } } },
             "targets": { "nodes": [3, 2] } }"#,
    ));
    doc.reindex();

    writer().write_model(&doc, dir.path()).unwrap();
    let main = fs::read_to_string(dir.path().join("main.tcl")).unwrap();

    let nodes = branch(&main, "# Nodes", 1);
    assert!(nodes.contains("\tnode 2 0.0 0.0 3.0\n\tnode 3 4.0 0.0 3.0\n\tnode 4 4.0 0.0 0.0\n"));
    assert!(branch(&main, "# Nodes", 0).contains("\tnode 2 0.0 0.0 3.0\n"));
    assert_eq!(main.matches("node 2 ").count(), 2);

    // shared node 3 is restrained in both of its branches
    assert!(branch(&main, "# Restraints", 0).contains("\tfix 3 1 1 1 0 0 0\n"));
    assert!(branch(&main, "# Restraints", 1).contains("\tfix 3 1 1 1 0 0 0\n"));
    assert_eq!(main.matches("fix 3 ").count(), 2);

    // the constraint follows its slave, mass and load follow the owner
    assert_eq!(branch(&main, "# Constraints", 1), "\tequalDOF 3 2 1 2 3\n");
    assert_eq!(main.matches("equalDOF 3 2 ").count(), 1);
    assert_eq!(branch(&main, "# Nodal masses", 0), "\tmass 3 2.0 2.0 2.0 0.0 0.0 0.0\n");
    assert_eq!(branch(&main, "# Nodal masses", 1), "\tmass 2 2.0 2.0 2.0 0.0 0.0 0.0\n");
    assert!(main.ends_with(
        "pattern Plain 50 12 {\n\tif {$STKO_VAR_process_id == 1} {\n\t\tload 2 10.0 0.0 0.0 0.0 0.0 0.0\n\t}\n}\n"
    ));

    let declared = main.find("\tnode 2 0.0 0.0 3.0\n\tnode 3").unwrap();
    assert!(declared < main.find("mass 2 ").unwrap());
}

#[test]
fn single_process_has_no_guards() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = portal_frame();
    doc.partitions.process_count = 1;
    doc.partitions.element_partition.clear();

    let report = writer().write_model(&doc, dir.path()).unwrap();
    assert!(report.cdata.files.is_empty());

    let main = fs::read_to_string(dir.path().join("main.tcl")).unwrap();
    assert!(!main.contains("STKO_VAR_process_id"));
    assert_eq!(main.matches("model basic").count(), 1);
    assert_eq!(main.matches("node 3 ").count(), 1);
    assert!(main.contains("pattern Plain 50 12 {\n\tload 2 10.0 0.0 0.0 0.0 0.0 0.0\n}\n"));
}

#[test]
fn synthesized_ids_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = portal_frame();
    doc.elements[2].property = Some(31);

    let report = writer().write_model(&doc, dir.path()).unwrap();
    assert_eq!(report.synthesized_nodes, 4);
    assert_eq!(report.synthesized_elements, 4);

    let main = fs::read_to_string(dir.path().join("main.tcl")).unwrap();
    for id in 4..=7 {
        assert_eq!(main.matches(&format!("element zeroLength {} ", id)).count(), 1);
    }
    for id in 5..=8 {
        assert_eq!(main.matches(&format!("node {} ", id)).count(), 1);
    }
}

#[test]
fn missing_attribute_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = portal_frame();
    doc.element_properties[0].attributes.remove("section");

    let err = writer().write_model(&doc, dir.path()).unwrap_err();
    assert!(matches!(err, EmitError::MissingAttribute { ref attribute, .. } if attribute == "section"));
}
