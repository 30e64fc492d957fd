//! JRA IPAT (即PAT) page structure and purchase workflow.

pub mod workflow;

pub use workflow::PurchaseWorkflow;

use crate::driver::Locator;

/// IPAT top page
pub const IPAT_URL: &str = "https://www.ipat.jra.go.jp/";

// Login page
pub const INET_ID_INPUT: Locator = Locator::name("inetid");
pub const LOGIN_LINK: Locator = Locator::xpath("//a[@title='ログイン' and @tabindex='4']");
pub const USER_NUMBER_INPUT: Locator = Locator::name("i");
pub const PASSWORD_INPUT: Locator = Locator::name("p");
pub const P_ARS_INPUT: Locator = Locator::name("r");
pub const VOTE_MENU_LINK: Locator =
    Locator::xpath("//a[@title='ネット投票メニューへ' and @tabindex='5']");

// Announcement (お知らせ) page shown after login on some days
pub const ANNOUNCE_HEADING: Locator = Locator::xpath("//h1[contains(text(), 'お知らせ')]");
pub const ANNOUNCE_OK_BUTTON: Locator = Locator::css("button.btn-ok");

// Top menu
pub const STANDARD_VOTE_BUTTON: Locator =
    Locator::xpath("//button[@title='出馬表から馬を選択する方式です。']");
pub const HOME_LINK: Locator = Locator::xpath("//a[@ui-sref='home' and @ng-click='vm.clickLogo()']");

/// Race list button of the day's last race; always present, so it is used
/// to reach the ticket entry page
pub const FINAL_RACE_BUTTON: Locator = Locator::xpath("//button[contains(., '12R')]");

// Ticket entry page
pub const VENUE_SELECT: Locator = Locator::id("select-course-race-course");
pub const RACE_SELECT: Locator = Locator::id("select-course-race-race");
pub const BET_TYPE_SELECT: Locator = Locator::id("bet-basic-type");
pub const HORSE_CHECKBOX: Locator = Locator::css(".check");
pub const UNIT_INPUT: Locator = Locator::xpath("//input[@maxlength='4' and @ng-model='vm.nUnit']");
pub const SET_BUTTON: Locator =
    Locator::css("button.btn.btn-lg.btn-set.btn-primary[ng-click='vm.onSet()']");

// Purchase list and confirmation dialog
pub const VOTE_LIST_BUTTON: Locator = Locator::xpath("//button[contains(@class, 'btn btn-vote-list')]");
pub const TOTAL_AMOUNT_INPUT: Locator = Locator::xpath("//input[@ng-model='vm.cAmountTotal']");
pub const PURCHASE_BUTTON: Locator = Locator::xpath("//button[contains(text(), '購入')]");
pub const CONFIRM_OK_BUTTON: Locator =
    Locator::xpath("//button[contains(@class, 'btn-ok') and contains(text(), 'OK')]");

/// Label wrapping the checkbox of a horse number
pub fn horse_label(horse_number: u8) -> Locator {
    Locator::xpath_owned(format!("//label[@for='no{}']", horse_number))
}

/// Text identifying a race in the race dropdown
pub fn race_label(race_number: u8) -> String {
    format!("{}R", race_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horse_label() {
        assert_eq!(horse_label(3).value, "//label[@for='no3']");
        assert_eq!(horse_label(18).value, "//label[@for='no18']");
    }

    #[test]
    fn test_race_label() {
        assert_eq!(race_label(1), "1R");
        assert_eq!(race_label(11), "11R");
    }
}
