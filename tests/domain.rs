use assert_matches::assert_matches;

use kira_target_structures::domain::{
    AccessionCode, ConvertFormat, SelectedStructure, StructureCandidate, StructureId,
    TargetIdentifier,
};
use kira_target_structures::error::KiraError;

#[test]
fn parse_target_identifier_valid() {
    let id: TargetIdentifier = "FGFR1_HUMAN".parse().unwrap();
    assert_eq!(id.as_str(), "FGFR1_HUMAN");
}

#[test]
fn parse_target_identifier_strips_invisible_and_version() {
    let id: TargetIdentifier = "\u{200b}ESR1_HUMAN.3\u{a0}".parse().unwrap();
    assert_eq!(id.as_str(), "ESR1_HUMAN");
}

#[test]
fn parse_target_identifier_keeps_non_numeric_suffix() {
    let err = "ESR1_HUMAN.x".parse::<TargetIdentifier>().unwrap_err();
    assert_matches!(err, KiraError::InvalidTargetId(_));
}

#[test]
fn parse_target_identifier_invalid() {
    for raw in ["", "   ", "\u{feff}", "uniprot id", "bad id!"] {
        let err = raw.parse::<TargetIdentifier>().unwrap_err();
        assert_matches!(err, KiraError::InvalidTargetId(_));
    }
}

#[test]
fn parse_accession_normalizes_case() {
    let acc: AccessionCode = " p22303 ".parse().unwrap();
    assert_eq!(acc.as_str(), "P22303");
}

#[test]
fn parse_accession_invalid() {
    let err = "".parse::<AccessionCode>().unwrap_err();
    assert_matches!(err, KiraError::InvalidAccession(_));

    let err = "P2_2303".parse::<AccessionCode>().unwrap_err();
    assert_matches!(err, KiraError::InvalidAccession(_));
}

#[test]
fn parse_structure_id_rejects_wrong_length() {
    let err = "1B41A".parse::<StructureId>().unwrap_err();
    assert_matches!(err, KiraError::InvalidStructureId(_));
}

#[test]
fn converted_file_names_per_format() {
    let selection = SelectedStructure {
        target: "FGFR1_HUMAN".parse().unwrap(),
        accession: "P11362".parse().unwrap(),
        candidate: StructureCandidate {
            structure_id: "4zsa".parse().unwrap(),
            method: None,
            resolution: None,
        },
    };
    assert_eq!(selection.file_stem(), "FGFR1_HUMAN_4ZSA");
    assert_eq!(
        selection.converted_file_name(ConvertFormat::Pdb),
        "FGFR1_HUMAN_4ZSA.pdb"
    );
    assert_eq!(
        selection.converted_file_name(ConvertFormat::Mae),
        "FGFR1_HUMAN_4ZSA.mae"
    );
}

#[test]
fn convert_format_order_is_pdb_then_mae() {
    assert_eq!(ConvertFormat::ALL, [ConvertFormat::Pdb, ConvertFormat::Mae]);
    assert_eq!(ConvertFormat::Mae.to_string(), "mae");
}
